pub mod detection; // Classification request pipeline
pub mod imaging; // Quality gate + preprocessing
