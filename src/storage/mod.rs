pub mod engine;
pub mod memory;
pub mod postgres;
pub mod table;

pub use engine::{CounterStore, EntityStore, Store};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use table::{Record, Table, VersionedTable};

/// The five persistent tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    DigitalLife,
    Creations,
    Comments,
    Thoughts,
    Tools,
}

impl TableKind {
    pub fn name(&self) -> &'static str {
        match self {
            TableKind::DigitalLife => "digital_life",
            TableKind::Creations => "creations",
            TableKind::Comments => "comments",
            TableKind::Thoughts => "thoughts",
            TableKind::Tools => "tools",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
