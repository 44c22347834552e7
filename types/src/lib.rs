pub mod phase0 {
    pub mod consts;
    pub mod containers;
    pub mod primitives;

    mod container_impls;
}
