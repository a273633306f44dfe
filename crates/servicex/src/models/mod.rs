//! Wire models exchanged with the ServiceX control plane.

pub mod dataset;
pub mod request;
pub mod status;

pub use dataset::DatasetIdentifier;
pub use request::{ResultDestination, ResultFormat, TransformRequest};
pub use status::{Credential, MinioConnection, ResultFile, Status, TransformStatus};
