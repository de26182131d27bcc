mod fixtures;
mod recovery;
