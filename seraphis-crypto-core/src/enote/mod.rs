//! Enote data model, payment proposals, and owned-output recovery.

pub mod core;
pub mod proposal;
pub mod record;

pub use core::{Enote, EnoteImage, EnoteType, SelfSendType};
pub use proposal::{EphemeralKey, OutputProposal, PaymentProposal, SelfSendProposal};
pub use record::{
    try_basic_record, try_full_record, try_intermediate_record, BasicRecord, EnoteRecordVariant,
    FullRecord, IntermediateRecord,
};
