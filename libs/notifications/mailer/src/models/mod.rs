mod address;
mod attachment;
mod bulk;
mod param;
mod sanitize;
mod status;

pub use address::{canonical_email, dedup_key, Address, AddressInput, AddressPayload};
pub use attachment::{Attachment, AttachmentPayload};
pub use bulk::Bulk;
pub use param::{AddressList, Param, Variable};
pub use status::Status;
