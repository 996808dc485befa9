pub mod classifier;
pub mod dedup;
pub mod errors;
pub mod exclusions;
pub mod models;
pub mod normalizer;
pub mod replay;
pub mod reporting;
pub mod results;
pub mod roles;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use classifier::{classify, classify_with_markers, LOGIN_MARKERS};
pub use dedup::fingerprint;
pub use errors::{MatrixError, TransportError};
pub use exclusions::{ExclusionPolicy, STATIC_EXTENSIONS};
pub use models::{
    CapturedRequest, HttpService, ObservedRequest, Protocol, TestResult, Verdict,
};
pub use normalizer::{build_replay_request, ReplayRequest};
pub use replay::{
    Canceller, NullObserver, ProgressObserver, ReplayConfig, ReplayEngine, RunHandle, RunState,
};
pub use reporting::{
    build_export, export_results, write_json_report, write_json_report_to, ExportDocument,
    ExportScope, ExportedResult, TOOL_TAG,
};
pub use results::{ResultFilter, ResultStore, VerdictCounts};
pub use roles::{Role, RoleSnapshot, RoleStore, RoleSummary};
pub use session::{load_session, save_session, SessionDocument};
pub use transport::{RawResponse, ReqwestTransport, Transport};
