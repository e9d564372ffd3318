//! The detours. Each module resolves its own patterns, owns its static
//! detour handles, and translates between raw host structures and the
//! capability traits of the `dyes` crate.

pub(crate) mod inventory;
pub(crate) mod msg;
pub(crate) mod params;
pub(crate) mod talk;
pub(crate) mod update;
