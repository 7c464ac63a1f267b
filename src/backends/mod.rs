mod lxc;

#[cfg(test)]
pub(crate) mod scripted;

pub use self::lxc::LxcBackend;
