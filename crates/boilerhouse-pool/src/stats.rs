//! `getStats()`.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: u32,
    pub claimed: u32,
    pub stopping: u32,
    pub size: u32,
    pub max_size: u32,
    pub min_idle: u32,
    pub pending: u32,
}
