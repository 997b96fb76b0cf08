//! sgtm-stack — declarative assembly of the tag-manager Fargate stack.
//!
//! Takes validated [`StackSettings`](sgtm_core::StackSettings) and a
//! fingerprinted container build context, and declares every resource
//! into a [`Provisioner`]. The in-tree provisioner is [`Template`], which
//! renders the declarations as a CloudFormation-shaped document.
//!
//! # Architecture
//!
//! ```text
//! GtmStack
//!   ├── Certificate (imported ARN | DNS-validated | none)
//!   ├── Network (VPC, 2 AZs, public/private subnets, NAT)
//!   ├── Cluster + log group
//!   ├── Task definition (image asset, CONTAINER_CONFIG)
//!   ├── ALB service (listener 443/80, /healthz target group, alias record)
//!   ├── Autoscaling (target tracking on CPU)
//!   └── Preview server (listener 444, own service), HTTPS + domain only
//! ```

pub mod asset;
pub mod error;
pub mod provisioner;
pub mod resource;
pub mod scaling;
pub mod stack;

pub use asset::ImageAsset;
pub use error::{StackError, StackResult};
pub use provisioner::{Provisioner, Template};
pub use resource::{Resource, ResourceType};
pub use stack::{GtmStack, StackSummary};
