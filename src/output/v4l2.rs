use nix::ioctl_readwrite;
use std::fs::File;
use std::os::fd::AsRawFd;

use super::loopback::PixFormat;

const VIDIOC_BASE: u8 = b'V';
const VIDIOC_S_FMT: u8 = 5;

const V4L2_BUF_TYPE_VIDEO_OUTPUT: u32 = 2;
const V4L2_FIELD_NONE: u32 = 1;

/// struct v4l2_format の fmt 共用体のサイズ
const FORMAT_UNION_LEN: usize = 200;

#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
struct V4l2PixFormat {
    width: u32,
    height: u32,
    pixelformat: u32,
    field: u32,
    bytesperline: u32,
    sizeimage: u32,
    colorspace: u32,
    priv_: u32,
    flags: u32,
    ycbcr_enc: u32,
    quantization: u32,
    xfer_func: u32,
}

// カーネル側は v4l2_window がポインタを含むのでポインタ境界に揃う
#[repr(C)]
union FormatUnion {
    pix: V4l2PixFormat,
    raw: [u8; FORMAT_UNION_LEN],
    _align: [usize; FORMAT_UNION_LEN / std::mem::size_of::<usize>()],
}

#[repr(C)]
struct V4l2Format {
    type_: u32,
    fmt: FormatUnion,
}

impl V4l2Format {
    fn output(format: &PixFormat) -> Self {
        let mut fmt = FormatUnion {
            raw: [0; FORMAT_UNION_LEN],
        };
        fmt.pix = V4l2PixFormat {
            width: format.width,
            height: format.height,
            pixelformat: format.pixelformat,
            field: V4L2_FIELD_NONE,
            bytesperline: format.bytesperline,
            sizeimage: format.sizeimage,
            ..V4l2PixFormat::default()
        };
        Self {
            type_: V4L2_BUF_TYPE_VIDEO_OUTPUT,
            fmt,
        }
    }

    fn pix_format(&self) -> PixFormat {
        let pix = unsafe { self.fmt.pix };
        PixFormat {
            width: pix.width,
            height: pix.height,
            pixelformat: pix.pixelformat,
            bytesperline: pix.bytesperline,
            sizeimage: pix.sizeimage,
        }
    }
}

ioctl_readwrite!(vidioc_s_fmt, VIDIOC_BASE, VIDIOC_S_FMT, V4l2Format);

/// 出力デバイスのフォーマットを設定し、ドライバが受け入れた値を返す
pub fn set_output_format(device: &File, format: &PixFormat) -> nix::Result<PixFormat> {
    let mut raw = V4l2Format::output(format);
    unsafe { vidioc_s_fmt(device.as_raw_fd(), &mut raw) }?;
    Ok(raw.pix_format())
}
