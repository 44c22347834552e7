use deposit_tree::DepositTreeSnapshot;

#[derive(Clone, Default, Debug)]
pub struct Eth1Config {
    /// Finalized deposit tree to start from instead of an empty one.
    /// Used for checkpoint sync.
    pub default_deposit_tree: Option<DepositTreeSnapshot>,
}
