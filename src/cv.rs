//! Conversions between crate frames and OpenCV matrices.

use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Scalar, CV_8UC1, CV_8UC3};
use opencv::prelude::*;

use crate::detect::SkinMask;
use crate::frame::Frame;

/// Copy a BGR frame into a freshly allocated `CV_8UC3` matrix.
pub(crate) fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )
    .context("allocate BGR matrix")?;
    mat.data_bytes_mut()
        .context("borrow BGR matrix bytes")?
        .copy_from_slice(frame.bgr());
    Ok(mat)
}

/// Copy a continuous `CV_8UC3` matrix into a frame.
pub(crate) fn mat_to_frame(mat: &Mat, index: u64) -> Result<Frame> {
    let size = mat.size().context("read matrix size")?;
    if mat.typ() != CV_8UC3 {
        return Err(anyhow!("expected an 8-bit 3-channel matrix"));
    }
    let data = mat
        .data_bytes()
        .context("borrow matrix bytes (non-continuous?)")?
        .to_vec();
    Frame::from_bgr(data, size.width as u32, size.height as u32, index)
}

/// Copy a single-channel mask into a `CV_8UC1` matrix.
pub(crate) fn mask_to_mat(mask: &SkinMask) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        mask.height as i32,
        mask.width as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )
    .context("allocate mask matrix")?;
    mat.data_bytes_mut()
        .context("borrow mask matrix bytes")?
        .copy_from_slice(&mask.data);
    Ok(mat)
}

pub(crate) fn mat_to_mask(mat: &Mat) -> Result<SkinMask> {
    let size = mat.size().context("read mask size")?;
    let data = mat.data_bytes().context("borrow mask bytes")?.to_vec();
    Ok(SkinMask {
        width: size.width as u32,
        height: size.height as u32,
        data,
    })
}
