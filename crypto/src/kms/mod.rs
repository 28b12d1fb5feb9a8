pub mod cloud;
pub mod local;
pub mod registry;
pub mod traits;

pub use cloud::{CloudKmsConfig, CloudKmsProvider};
pub use local::LocalKmsProvider;
pub use registry::KmsRegistry;
pub use traits::{KeyHandle, KmsProvider, KMS_OPERATION_TIMEOUT};
