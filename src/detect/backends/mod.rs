pub mod cpu;

#[cfg(feature = "backend-opencv")]
pub mod opencv;

pub use cpu::CpuBackend;

#[cfg(feature = "backend-opencv")]
pub use self::opencv::OpenCvBackend;
