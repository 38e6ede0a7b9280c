pub mod model;
pub mod provider;

pub use model::{Instance, InstanceState, LoaderType};
pub use provider::{FolderInstanceProvider, InstanceProvider, StagingDir};
