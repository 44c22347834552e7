pub use crate::{
    deposit_cache::{DepositCache, Error, FinalizedAccumulator},
    deposit_record::DepositRecord,
    eth1_config::Eth1Config,
};

mod deposit_cache;
mod deposit_record;
mod eth1_config;
