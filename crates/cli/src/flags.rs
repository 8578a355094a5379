use clap::ValueEnum;
use reconcile_engine::LayoutPolicy;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum LayoutFlag {
    Any,
    Flat,
    Nested,
}

impl LayoutFlag {
    pub(crate) const fn as_domain(self) -> LayoutPolicy {
        match self {
            LayoutFlag::Any => LayoutPolicy::Any,
            LayoutFlag::Flat => LayoutPolicy::Flat,
            LayoutFlag::Nested => LayoutPolicy::Nested,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum SchemaKind {
    /// JSON emitted by `preview --json` and `commit --json`
    Report,
    /// JSON emitted by `index --json`
    Index,
}
