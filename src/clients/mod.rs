pub mod convert;
mod kubernetes;
mod traits;

pub use self::kubernetes::KubeCluster;
pub use self::traits::*;
