//! SimBench wire protocol.
//!
//! Request/response DTOs for the control API and the framed console stream,
//! shared between the engine and its clients.

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::{ConsoleFrame, ConsoleMessage, ConsoleStream};
pub use requests::{
    CosimMemberSpec, CreateCosimRequest, CreateSessionRequest, CreateSnapshotRequest,
    InjectEventRequest, LoadProgramRequest, PageQuery, SyncStepRequest, SyncTimeRequest,
    UploadProgramQuery,
};
pub use responses::{
    CosimInfo, CosimMemberInfo, ErrorBody, ProgramInfo, SessionInfo, SessionListResponse,
    SnapshotInfo,
};
