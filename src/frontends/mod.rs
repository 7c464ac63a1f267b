mod build_file;

pub use self::build_file::BuildFileFrontend;
