//! Building blocks shared by podguard modules and the control plane that
//! drives them.

pub mod pdk;
