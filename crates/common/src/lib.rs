// coreport-common: pure building blocks shared by the coreport crates

pub mod acronym;
pub mod cvss;
pub mod protocol;
pub mod textmap;
pub mod types;
