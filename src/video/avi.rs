//! Uncompressed RIFF/AVI reader and writer (24-bit BGR, `DIB ` handler)
//!
//! On disk rows are bottom-up and padded to 4 bytes per the DIB layout;
//! in memory frames are packed top-down. The writer patches the RIFF and
//! stream headers and appends the `idx1` index on release, so a file
//! finalized mid-stream is still a valid container holding every frame that
//! was fully written.

use crate::video::error::VideoError;
use crate::video::frame::{FrameGeometry, VideoFrame};
use crate::video::traits::{FrameSink, FrameSource};
use bytes::Bytes;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FOURCC_RIFF: &[u8; 4] = b"RIFF";
const FOURCC_AVI: &[u8; 4] = b"AVI ";
const FOURCC_LIST: &[u8; 4] = b"LIST";
const FOURCC_HDRL: &[u8; 4] = b"hdrl";
const FOURCC_AVIH: &[u8; 4] = b"avih";
const FOURCC_STRL: &[u8; 4] = b"strl";
const FOURCC_STRH: &[u8; 4] = b"strh";
const FOURCC_STRF: &[u8; 4] = b"strf";
const FOURCC_MOVI: &[u8; 4] = b"movi";
const FOURCC_IDX1: &[u8; 4] = b"idx1";
const FOURCC_VIDS: &[u8; 4] = b"vids";
const FOURCC_DIB: &[u8; 4] = b"DIB ";
/// Uncompressed video frame chunk inside `movi`.
const FOURCC_00DB: &[u8; 4] = b"00db";
/// Compressed frame chunk id; tolerated on read, treated the same.
const FOURCC_00DC: &[u8; 4] = b"00dc";

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

/// DIB rows are padded to a 4-byte boundary.
fn dib_stride(geometry: &FrameGeometry) -> usize {
    (geometry.row_bytes() + 3) & !3
}

fn dib_frame_bytes(geometry: &FrameGeometry) -> usize {
    dib_stride(geometry) * geometry.height
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Frame source backed by an uncompressed AVI file.
pub struct AviFrameSource {
    reader: Option<BufReader<File>>,
    geometry: FrameGeometry,
    /// Absolute range of the `movi` payload (past the list type fourcc).
    movi_end: u64,
    cursor: u64,
}

impl AviFrameSource {
    /// Open `path` and parse the headers up to the `movi` list.
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        let file = File::open(path).map_err(|source| VideoError::SourceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let (geometry, movi_end, cursor) =
            Self::parse_headers(&mut reader).map_err(|e| match e {
                HeaderError::Io(source) => VideoError::SourceOpen {
                    path: path.to_path_buf(),
                    source,
                },
                HeaderError::Malformed(msg) => VideoError::Malformed(msg),
            })?;

        reader
            .seek(SeekFrom::Start(cursor))
            .map_err(|source| VideoError::SourceOpen {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            reader: Some(reader),
            geometry,
            movi_end,
            cursor,
        })
    }

    /// Returns the stream geometry plus the byte range of the movi payload.
    fn parse_headers(
        reader: &mut BufReader<File>,
    ) -> Result<(FrameGeometry, u64, u64), HeaderError> {
        let mut riff = [0u8; 12];
        reader.read_exact(&mut riff)?;
        if &riff[0..4] != FOURCC_RIFF || &riff[8..12] != FOURCC_AVI {
            return Err(HeaderError::Malformed("not a RIFF/AVI file".into()));
        }
        let riff_end = 8 + u64::from(u32::from_le_bytes(riff[4..8].try_into().unwrap()));

        let mut geometry: Option<FrameGeometry> = None;

        // Walk the top-level chunks until the movi list shows up.
        let mut pos = 12u64;
        while pos + 8 <= riff_end {
            reader.seek(SeekFrom::Start(pos))?;
            let (fourcc, size) = read_chunk_header(reader)?;
            let data_pos = pos + 8;

            if &fourcc == FOURCC_LIST {
                let mut list_type = [0u8; 4];
                reader.read_exact(&mut list_type)?;

                if &list_type == FOURCC_HDRL {
                    let len = (size as u64).saturating_sub(4);
                    geometry = Some(Self::parse_hdrl(reader, data_pos + 4, len)?);
                } else if &list_type == FOURCC_MOVI {
                    let geometry = geometry.ok_or_else(|| {
                        HeaderError::Malformed("movi list before stream headers".into())
                    })?;
                    return Ok((geometry, data_pos + size as u64, data_pos + 4));
                }
            }

            pos = data_pos + size as u64 + (size as u64 & 1);
        }

        Err(HeaderError::Malformed("no movi list found".into()))
    }

    /// Find the `strf` BITMAPINFOHEADER inside the header list and pull the
    /// stream geometry out of it.
    fn parse_hdrl(
        reader: &mut BufReader<File>,
        start: u64,
        len: u64,
    ) -> Result<FrameGeometry, HeaderError> {
        let end = start + len;
        let mut pos = start;
        while pos + 8 <= end {
            reader.seek(SeekFrom::Start(pos))?;
            let (fourcc, size) = read_chunk_header(reader)?;
            let data_pos = pos + 8;

            if &fourcc == FOURCC_LIST {
                let mut list_type = [0u8; 4];
                reader.read_exact(&mut list_type)?;
                if &list_type == FOURCC_STRL {
                    let len = (size as u64).saturating_sub(4);
                    if let Some(g) = Self::parse_strl(reader, data_pos + 4, len)? {
                        return Ok(g);
                    }
                }
            }

            pos = data_pos + size as u64 + (size as u64 & 1);
        }
        Err(HeaderError::Malformed("no video stream format found".into()))
    }

    fn parse_strl(
        reader: &mut BufReader<File>,
        start: u64,
        len: u64,
    ) -> Result<Option<FrameGeometry>, HeaderError> {
        let end = start + len;
        let mut pos = start;
        let mut is_video = false;

        while pos + 8 <= end {
            reader.seek(SeekFrom::Start(pos))?;
            let (fourcc, size) = read_chunk_header(reader)?;

            if &fourcc == FOURCC_STRH {
                let mut fcc_type = [0u8; 4];
                reader.read_exact(&mut fcc_type)?;
                is_video = &fcc_type == FOURCC_VIDS;
            } else if &fourcc == FOURCC_STRF && is_video {
                if size < 40 {
                    return Err(HeaderError::Malformed("truncated BITMAPINFOHEADER".into()));
                }
                let mut bih = [0u8; 40];
                reader.read_exact(&mut bih)?;
                let width = i32::from_le_bytes(bih[4..8].try_into().unwrap());
                let height = i32::from_le_bytes(bih[8..12].try_into().unwrap());
                let bit_count = u16::from_le_bytes(bih[14..16].try_into().unwrap());
                let compression = u32::from_le_bytes(bih[16..20].try_into().unwrap());

                if compression != 0 {
                    return Err(HeaderError::Malformed(format!(
                        "unsupported compression 0x{:08x}, only raw DIB is handled",
                        compression
                    )));
                }
                if bit_count % 8 != 0 || bit_count == 0 {
                    return Err(HeaderError::Malformed(format!(
                        "unsupported bit depth {}",
                        bit_count
                    )));
                }
                return Ok(Some(FrameGeometry::new(
                    width.unsigned_abs() as usize,
                    height.unsigned_abs() as usize,
                    (bit_count / 8) as usize,
                )));
            }

            pos += 8 + size as u64 + (size as u64 & 1);
        }
        Ok(None)
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Convert one on-disk DIB payload (bottom-up, padded rows) into a
    /// packed top-down frame.
    fn unpack_dib(&self, raw: &[u8]) -> VideoFrame {
        let stride = dib_stride(&self.geometry);
        let row_bytes = self.geometry.row_bytes();
        let mut packed = vec![0u8; self.geometry.frame_bytes()];

        for y in 0..self.geometry.height {
            let src = (self.geometry.height - 1 - y) * stride;
            packed[y * row_bytes..(y + 1) * row_bytes]
                .copy_from_slice(&raw[src..src + row_bytes]);
        }

        VideoFrame::from_packed(self.geometry, Bytes::from(packed))
    }
}

impl FrameSource for AviFrameSource {
    fn read(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let expected = dib_frame_bytes(&self.geometry);

        // Skip over non-frame chunks (rec lists, junk) until a frame or the
        // end of the movi payload.
        loop {
            if self.cursor + 8 > self.movi_end {
                return Ok(None);
            }

            reader
                .seek(SeekFrom::Start(self.cursor))
                .map_err(|e| VideoError::DecodeRead(e.to_string()))?;
            let (fourcc, size) = read_chunk_header(reader)
                .map_err(|e| VideoError::DecodeRead(e.to_string()))?;
            let next = self.cursor + 8 + size as u64 + (size as u64 & 1);

            if &fourcc == FOURCC_00DB || &fourcc == FOURCC_00DC {
                self.cursor = next;
                if size as usize != expected {
                    return Err(VideoError::DecodeRead(format!(
                        "frame chunk of {} bytes, expected {}",
                        size, expected
                    )));
                }
                let mut raw = vec![0u8; expected];
                reader
                    .read_exact(&mut raw)
                    .map_err(|e| VideoError::DecodeRead(e.to_string()))?;
                return Ok(Some(self.unpack_dib(&raw)));
            }

            debug!(
                "skipping chunk {} ({} bytes) inside movi",
                String::from_utf8_lossy(&fourcc),
                size
            );
            self.cursor = next;
        }
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn release(&mut self) {
        self.reader = None;
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Frame sink producing an uncompressed AVI at a fixed frame rate.
#[derive(Debug)]
pub struct AviFrameSink {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    geometry: FrameGeometry,
    fps: u32,
    frames_written: u32,
    /// Byte offsets of frame chunks relative to the `movi` fourcc, for idx1.
    index: Vec<u32>,
    movi_size_pos: u64,
    total_frames_pos: u64,
    stream_length_pos: u64,
    movi_data_pos: u64,
}

impl AviFrameSink {
    /// Create `path` and write the fixed-geometry headers. Only 3-channel
    /// (BGR24) streams are supported by this container choice.
    pub fn create(path: &Path, geometry: FrameGeometry, fps: u32) -> Result<Self, VideoError> {
        if geometry.channels != 3 {
            return Err(VideoError::SinkOpen {
                path: path.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} channels unsupported, DIB sink writes BGR24", geometry.channels),
                ),
            });
        }

        let open_err = |source| VideoError::SinkOpen {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(open_err)?;
        let mut writer = BufWriter::new(file);

        let mut sink = Self {
            writer: None,
            path: path.to_path_buf(),
            geometry,
            fps,
            frames_written: 0,
            index: Vec::new(),
            movi_size_pos: 0,
            total_frames_pos: 0,
            stream_length_pos: 0,
            movi_data_pos: 0,
        };
        sink.write_headers(&mut writer).map_err(open_err)?;
        sink.writer = Some(writer);
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_headers(&mut self, w: &mut BufWriter<File>) -> io::Result<()> {
        let frame_bytes = dib_frame_bytes(&self.geometry) as u32;

        // RIFF size is patched on release.
        w.write_all(FOURCC_RIFF)?;
        w.write_all(&0u32.to_le_bytes())?;
        w.write_all(FOURCC_AVI)?;

        // hdrl list: avih + one strl (strh + strf), fixed sizes.
        let strl_size = 4 + (8 + 56) + (8 + 40);
        let hdrl_size = 4 + (8 + 56) + (8 + strl_size);
        w.write_all(FOURCC_LIST)?;
        w.write_all(&(hdrl_size as u32).to_le_bytes())?;
        w.write_all(FOURCC_HDRL)?;

        w.write_all(FOURCC_AVIH)?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(&(1_000_000 / self.fps).to_le_bytes())?; // dwMicroSecPerFrame
        w.write_all(&(frame_bytes * self.fps).to_le_bytes())?; // dwMaxBytesPerSec
        w.write_all(&0u32.to_le_bytes())?; // dwPaddingGranularity
        w.write_all(&AVIF_HASINDEX.to_le_bytes())?; // dwFlags
        self.total_frames_pos = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?; // dwTotalFrames (patched)
        w.write_all(&0u32.to_le_bytes())?; // dwInitialFrames
        w.write_all(&1u32.to_le_bytes())?; // dwStreams
        w.write_all(&frame_bytes.to_le_bytes())?; // dwSuggestedBufferSize
        w.write_all(&(self.geometry.width as u32).to_le_bytes())?;
        w.write_all(&(self.geometry.height as u32).to_le_bytes())?;
        w.write_all(&[0u8; 16])?; // dwReserved

        w.write_all(FOURCC_LIST)?;
        w.write_all(&(strl_size as u32).to_le_bytes())?;
        w.write_all(FOURCC_STRL)?;

        w.write_all(FOURCC_STRH)?;
        w.write_all(&56u32.to_le_bytes())?;
        w.write_all(FOURCC_VIDS)?;
        w.write_all(FOURCC_DIB)?;
        w.write_all(&0u32.to_le_bytes())?; // dwFlags
        w.write_all(&0u16.to_le_bytes())?; // wPriority
        w.write_all(&0u16.to_le_bytes())?; // wLanguage
        w.write_all(&0u32.to_le_bytes())?; // dwInitialFrames
        w.write_all(&1u32.to_le_bytes())?; // dwScale
        w.write_all(&self.fps.to_le_bytes())?; // dwRate
        w.write_all(&0u32.to_le_bytes())?; // dwStart
        self.stream_length_pos = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?; // dwLength (patched)
        w.write_all(&frame_bytes.to_le_bytes())?; // dwSuggestedBufferSize
        w.write_all(&u32::MAX.to_le_bytes())?; // dwQuality (-1 = default)
        w.write_all(&0u32.to_le_bytes())?; // dwSampleSize
        w.write_all(&0u16.to_le_bytes())?; // rcFrame.left
        w.write_all(&0u16.to_le_bytes())?; // rcFrame.top
        w.write_all(&(self.geometry.width as u16).to_le_bytes())?;
        w.write_all(&(self.geometry.height as u16).to_le_bytes())?;

        w.write_all(FOURCC_STRF)?;
        w.write_all(&40u32.to_le_bytes())?;
        w.write_all(&40u32.to_le_bytes())?; // biSize
        w.write_all(&(self.geometry.width as i32).to_le_bytes())?;
        w.write_all(&(self.geometry.height as i32).to_le_bytes())?; // positive = bottom-up
        w.write_all(&1u16.to_le_bytes())?; // biPlanes
        w.write_all(&24u16.to_le_bytes())?; // biBitCount
        w.write_all(&0u32.to_le_bytes())?; // biCompression = BI_RGB
        w.write_all(&frame_bytes.to_le_bytes())?; // biSizeImage
        w.write_all(&[0u8; 16])?; // pels-per-meter, clr fields

        // movi list, sized on release.
        w.write_all(FOURCC_LIST)?;
        self.movi_size_pos = w.stream_position()?;
        w.write_all(&0u32.to_le_bytes())?;
        self.movi_data_pos = w.stream_position()?;
        w.write_all(FOURCC_MOVI)?;

        Ok(())
    }

    fn finalize(&mut self, mut w: BufWriter<File>) -> io::Result<()> {
        let frame_bytes = dib_frame_bytes(&self.geometry) as u32;

        // idx1: one keyframe entry per frame chunk.
        w.write_all(FOURCC_IDX1)?;
        w.write_all(&(self.index.len() as u32 * 16).to_le_bytes())?;
        for &offset in &self.index {
            w.write_all(FOURCC_00DB)?;
            w.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            w.write_all(&offset.to_le_bytes())?;
            w.write_all(&frame_bytes.to_le_bytes())?;
        }

        let file_len = w.stream_position()?;

        // Patch the sizes the streaming pass could not know.
        w.seek(SeekFrom::Start(4))?;
        w.write_all(&((file_len - 8) as u32).to_le_bytes())?;

        let movi_end = self.movi_data_pos + 4 + self.frames_written as u64 * (8 + frame_bytes as u64);
        w.seek(SeekFrom::Start(self.movi_size_pos))?;
        w.write_all(&((movi_end - self.movi_data_pos) as u32).to_le_bytes())?;

        w.seek(SeekFrom::Start(self.total_frames_pos))?;
        w.write_all(&self.frames_written.to_le_bytes())?;
        w.seek(SeekFrom::Start(self.stream_length_pos))?;
        w.write_all(&self.frames_written.to_le_bytes())?;

        w.flush()
    }
}

impl FrameSink for AviFrameSink {
    fn write(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
        // Geometry is fixed at open; a differently sized frame is a caller
        // bug and must not be silently swallowed as a transient write error.
        assert_eq!(
            frame.geometry(),
            self.geometry,
            "frame geometry changed mid-run"
        );

        let Some(w) = self.writer.as_mut() else {
            return Err(VideoError::SinkWrite {
                source: io::Error::new(io::ErrorKind::NotConnected, "sink already released"),
            });
        };

        let stride = dib_stride(&self.geometry);
        let row_bytes = self.geometry.row_bytes();
        let pad = [0u8; 3];

        let write_err = |source| VideoError::SinkWrite { source };

        let chunk_pos = w.stream_position().map_err(write_err)?;
        w.write_all(FOURCC_00DB).map_err(write_err)?;
        w.write_all(&(dib_frame_bytes(&self.geometry) as u32).to_le_bytes())
            .map_err(write_err)?;
        for y in (0..self.geometry.height).rev() {
            w.write_all(frame.row(y)).map_err(write_err)?;
            w.write_all(&pad[..stride - row_bytes]).map_err(write_err)?;
        }

        self.index.push((chunk_pos - self.movi_data_pos) as u32);
        self.frames_written += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn release(&mut self) -> Result<(), VideoError> {
        let Some(w) = self.writer.take() else {
            return Ok(());
        };
        self.finalize(w).map_err(|source| VideoError::SinkWrite { source })
    }
}

impl Drop for AviFrameSink {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.release() {
                warn!("failed to finalize {}: {}", self.path.display(), e);
            }
        }
    }
}

// ---------------------------------------------------------------------------

fn read_chunk_header(reader: &mut BufReader<File>) -> io::Result<([u8; 4], u32)> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let fourcc = [header[0], header[1], header[2], header[3]];
    let size = u32::from_le_bytes(header[4..8].try_into().unwrap());
    Ok((fourcc, size))
}

enum HeaderError {
    Io(io::Error),
    Malformed(String),
}

impl From<io::Error> for HeaderError {
    fn from(e: io::Error) -> Self {
        HeaderError::Io(e)
    }
}
