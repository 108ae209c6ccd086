/// This module provides the tag-driven CSV record reader and writer.
pub mod csv;

/// This module provides map-shaped readers and writers for two-column and header-keyed data.
pub mod maps;

/// This module moves records between CSV and bounded channels on blocking threads.
pub mod pipeline;
