pub mod control;
pub mod identity;
pub mod loaders;
pub mod plan;
pub mod result;
pub mod run;
pub mod target;

pub use control::{
    CancelResponse, ResultsResponse, RunView, StartRequest, StartResponse, StatusResponse,
};
pub use identity::Identity;
pub use loaders::{load_job_file, parse_job, CrowdJob};
pub use plan::{ClassifiedField, Enctype, FieldDisposition, FieldRole, Method, SubmissionPlan};
pub use result::{ResultRecord, ResultStatus, SubmissionOutcome};
pub use run::{Run, RunId, RunScope, RunStatus};
pub use target::{LinkId, LinkTarget};
