use crate::frame::Frame;
use crate::Error;

pub trait Executable {
    fn exec(self) -> Result<Frame, Error>;
}
