
// Instruments driven over SCPI. Only Keysight scopes so far; further models get their own module.

pub mod dsox3000;
