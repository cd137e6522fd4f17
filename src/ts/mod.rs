mod packet;
pub use self::packet::*;
