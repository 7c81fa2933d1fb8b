pub(crate) mod callback;
pub(crate) mod sleep;
pub(crate) mod spawn;
