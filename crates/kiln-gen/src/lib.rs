//! Kiln Gen - job orchestration for the Hunyuan 3D generation service
//!
//! Validates a generation request, uploads local images, submits the job,
//! polls it with capped exponential backoff, extracts the result archive,
//! picks the canonical mesh and writes a `metadata.json` run record.

pub mod config;
pub mod job;
pub mod materialize;
pub mod poll;
pub mod provider;
pub mod providers;
pub mod record;
pub mod request;
pub mod run;
pub mod upload;

pub use config::KilnConfig;
pub use job::{JobHandle, JobResult, JobStatus, PollState, ResultFile};
pub use materialize::{select_canonical, select_canonical_mesh, ArtifactKind, DownloadedFile};
pub use poll::{poll_until_terminal, PollOutcome, PollPolicy, PollReport};
pub use provider::{JobProvider, JobSubmission, ProviderKind, ViewImageUrl};
pub use record::{RunRecord, RECORD_FILE_NAME};
pub use request::{GenerationInput, GenerationRequest, RawInputs, ViewImage, ViewKind};
pub use run::{generate_model, timestamped_output_dir, Generator, RunOptions, RunOutcome};
pub use upload::{AssetUploader, CosUploader};
