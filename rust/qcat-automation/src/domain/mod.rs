//! Domain sub-schedulers (spec §4.3-§4.6, §4.9, §4.10): the six
//! handler groups bound into the fixed task catalog at startup.

pub mod data;
pub mod learning;
pub mod position;
pub mod risk;
pub mod strategy;
pub mod system;
