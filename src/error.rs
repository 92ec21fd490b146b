use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("Accessed the payload of a null handle")]
    NullHandle,

    #[error("Combined allocation of {size} bytes (align {align}) failed")]
    AllocFailed { size: usize, align: usize },

    #[error("Combined layout overflows the address space")]
    LayoutOverflow,
}
