//! Custom field services: allocation, option ids, record synchronization, validation.

pub mod actor;
pub mod fields;
pub mod options;
pub mod order;
pub mod records;
pub mod ref_id;
pub mod validation;

pub use actor::{Actor, ActorResolver, HeaderActorResolver, RequestContext};
pub use fields::{CustomFields, CustomFieldsService};
pub use records::RecordSynchronizer;
pub use validation::FieldValidator;
