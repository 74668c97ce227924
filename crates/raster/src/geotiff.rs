//! GeoTIFF decoding and encoding on top of the `tiff` crate.
//!
//! Only strip or tile images in chunky layout are read; output is always a
//! single uncompressed strip.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use gis_common::{GisError, GisResult};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

use crate::model::{GeoKeys, Raster, SampleFormat, SampleLayout, PHOTOMETRIC_MIN_IS_BLACK, PHOTOMETRIC_RGB};
use crate::transform::GeoTransform;

// GeoTIFF and GDAL private tags
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tiff_err(e: tiff::TiffError) -> GisError {
    GisError::Raster(e.to_string())
}

fn find_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, id: u16) -> GisResult<Option<Vec<f64>>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(id))
        .map_err(tiff_err)?
        .map(|value| value.into_f64_vec())
        .transpose()
        .map_err(tiff_err)
}

/// SHORT tags arrive as `Unsigned` scalars or `List`s depending on count.
fn find_u16s<R: Read + Seek>(decoder: &mut Decoder<R>, id: u16) -> GisResult<Option<Vec<u16>>> {
    let Some(values) = decoder
        .find_tag(Tag::from_u16_exhaustive(id))
        .map_err(tiff_err)?
        .map(|value| value.into_u32_vec())
        .transpose()
        .map_err(tiff_err)?
    else {
        return Ok(None);
    };

    values
        .into_iter()
        .map(|v| {
            u16::try_from(v)
                .map_err(|_| GisError::Raster(format!("tag {} value {} exceeds u16", id, v)))
        })
        .collect::<GisResult<Vec<u16>>>()
        .map(Some)
}

fn find_string<R: Read + Seek>(decoder: &mut Decoder<R>, id: u16) -> GisResult<Option<String>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(id))
        .map_err(tiff_err)?
        .map(|value| value.into_string())
        .transpose()
        .map_err(tiff_err)
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> GisResult<GeoTransform> {
    let scale = find_f64s(decoder, MODEL_PIXEL_SCALE)?;
    let tiepoint = find_f64s(decoder, MODEL_TIEPOINT)?;
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        return GeoTransform::from_tiepoint(&tiepoint, &scale);
    }
    match find_f64s(decoder, MODEL_TRANSFORMATION)? {
        Some(matrix) => GeoTransform::from_model_transformation(&matrix),
        None => Err(GisError::Raster(
            "TIFF has no georeferencing (tiepoint or transformation tag)".to_string(),
        )),
    }
}

/// Decoded samples as little-endian bytes plus their type and count.
struct Samples {
    bytes: Vec<u8>,
    count: usize,
    bits: u16,
    format: SampleFormat,
}

fn samples<T: Copy, const N: usize>(
    values: Vec<T>,
    to_le: fn(T) -> [u8; N],
    format: SampleFormat,
) -> Samples {
    Samples {
        count: values.len(),
        bytes: values.into_iter().flat_map(to_le).collect(),
        bits: (N * 8) as u16,
        format,
    }
}

fn into_samples(image: DecodingResult) -> GisResult<Samples> {
    use SampleFormat::*;
    #[allow(unreachable_patterns)]
    let decoded = match image {
        DecodingResult::U8(v) => Samples {
            count: v.len(),
            bytes: v,
            bits: 8,
            format: Unsigned,
        },
        DecodingResult::U16(v) => samples(v, u16::to_le_bytes, Unsigned),
        DecodingResult::U32(v) => samples(v, u32::to_le_bytes, Unsigned),
        DecodingResult::U64(v) => samples(v, u64::to_le_bytes, Unsigned),
        DecodingResult::I8(v) => samples(v, i8::to_le_bytes, Signed),
        DecodingResult::I16(v) => samples(v, i16::to_le_bytes, Signed),
        DecodingResult::I32(v) => samples(v, i32::to_le_bytes, Signed),
        DecodingResult::I64(v) => samples(v, i64::to_le_bytes, Signed),
        DecodingResult::F32(v) => samples(v, f32::to_le_bytes, Float),
        DecodingResult::F64(v) => samples(v, f64::to_le_bytes, Float),
        _ => return Err(GisError::Raster("unsupported TIFF sample type".to_string())),
    };
    Ok(decoded)
}

fn parse_nodata(text: &str) -> Option<f64> {
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse::<f64>()
        .ok()
}

/// Read a GeoTIFF from disk.
pub fn read_geotiff(path: &Path) -> GisResult<Raster> {
    let file = File::open(path)?;
    decode_geotiff(BufReader::new(file))
}

/// Decode a GeoTIFF from any seekable reader.
pub fn decode_geotiff<R: Read + Seek>(reader: R) -> GisResult<Raster> {
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;

    let planar = find_u16s(&mut decoder, Tag::PlanarConfiguration.to_u16())?;
    if planar.as_deref().and_then(|p| p.first()) == Some(&2) {
        return Err(GisError::Raster(
            "planar (band-separate) TIFF layout is not supported".to_string(),
        ));
    }
    let photometric = find_u16s(&mut decoder, Tag::PhotometricInterpretation.to_u16())?
        .and_then(|p| p.first().copied())
        .unwrap_or(PHOTOMETRIC_MIN_IS_BLACK);

    let transform = read_transform(&mut decoder)?;
    let geokeys = GeoKeys {
        directory: find_u16s(&mut decoder, GEO_KEY_DIRECTORY)?.unwrap_or_default(),
        double_params: find_f64s(&mut decoder, GEO_DOUBLE_PARAMS)?,
        ascii_params: find_string(&mut decoder, GEO_ASCII_PARAMS)?,
    };
    let nodata = find_string(&mut decoder, GDAL_NODATA)?
        .as_deref()
        .and_then(parse_nodata);

    let decoded = into_samples(decoder.read_image().map_err(tiff_err)?)?;
    let pixels = width as usize * height as usize;
    if pixels == 0 || decoded.count % pixels != 0 {
        return Err(GisError::Raster(format!(
            "{} samples do not fill a {}x{} grid",
            decoded.count, width, height
        )));
    }
    let samples_per_pixel = u16::try_from(decoded.count / pixels)
        .map_err(|_| GisError::Raster("too many samples per pixel".to_string()))?;

    let crs = geokeys.crs();
    debug!(
        width,
        height,
        samples_per_pixel,
        bits = decoded.bits,
        crs = ?crs,
        nodata = ?nodata,
        "Decoded GeoTIFF"
    );

    Ok(Raster {
        width,
        height,
        layout: SampleLayout {
            samples_per_pixel,
            bits_per_sample: decoded.bits,
            format: decoded.format,
        },
        data: decoded.bytes,
        photometric,
        transform,
        nodata,
        geokeys,
        crs,
    })
}

/// Photometric interpretation and color band count for the layouts the
/// decoder can read back: one gray band, or RGB with an optional alpha.
fn encodable_layout(raster: &Raster) -> GisResult<(u16, usize)> {
    match (raster.layout.samples_per_pixel, raster.photometric) {
        (1, _) => Ok((PHOTOMETRIC_MIN_IS_BLACK, 1)),
        (3 | 4, PHOTOMETRIC_RGB) => Ok((PHOTOMETRIC_RGB, 3)),
        (bands, photometric) => Err(GisError::Raster(format!(
            "cannot encode {} band(s) with photometric interpretation {}",
            bands, photometric
        ))),
    }
}

/// Encode `raster` as an uncompressed single-strip GeoTIFF.
pub fn encode_geotiff(raster: &Raster) -> GisResult<Vec<u8>> {
    raster.validate()?;
    let strip_len = u32::try_from(raster.data.len())
        .map_err(|_| GisError::Raster("raster exceeds 4 GiB classic TIFF limit".to_string()))?;

    let layout = raster.layout;
    let bands = layout.samples_per_pixel as usize;
    let (photometric, color_bands) = encodable_layout(raster)?;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).map_err(tiff_err)?;
        let mut dir = encoder.new_directory().map_err(tiff_err)?;

        dir.write_tag(Tag::ImageWidth, raster.width).map_err(tiff_err)?;
        dir.write_tag(Tag::ImageLength, raster.height).map_err(tiff_err)?;
        dir.write_tag(Tag::BitsPerSample, vec![layout.bits_per_sample; bands].as_slice())
            .map_err(tiff_err)?;
        dir.write_tag(Tag::Compression, 1u16).map_err(tiff_err)?;
        dir.write_tag(Tag::PhotometricInterpretation, photometric)
            .map_err(tiff_err)?;
        dir.write_tag(Tag::SamplesPerPixel, layout.samples_per_pixel)
            .map_err(tiff_err)?;
        dir.write_tag(Tag::SampleFormat, vec![layout.format.tag_value(); bands].as_slice())
            .map_err(tiff_err)?;
        dir.write_tag(Tag::PlanarConfiguration, 1u16).map_err(tiff_err)?;
        dir.write_tag(Tag::RowsPerStrip, raster.height).map_err(tiff_err)?;
        if bands > color_bands {
            dir.write_tag(Tag::ExtraSamples, vec![0u16; bands - color_bands].as_slice())
                .map_err(tiff_err)?;
        }

        let transform = &raster.transform;
        if transform.is_north_up() {
            dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &transform.pixel_scale()[..])
                .map_err(tiff_err)?;
            dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &transform.tiepoint()[..])
                .map_err(tiff_err)?;
        } else {
            dir.write_tag(
                Tag::Unknown(MODEL_TRANSFORMATION),
                &transform.model_transformation()[..],
            )
            .map_err(tiff_err)?;
        }

        let geokeys = &raster.geokeys;
        if !geokeys.directory.is_empty() {
            dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.directory.as_slice())
                .map_err(tiff_err)?;
        }
        if let Some(params) = &geokeys.double_params {
            dir.write_tag(Tag::Unknown(GEO_DOUBLE_PARAMS), params.as_slice())
                .map_err(tiff_err)?;
        }
        if let Some(params) = &geokeys.ascii_params {
            dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), params.as_str())
                .map_err(tiff_err)?;
        }
        if let Some(nodata) = raster.nodata {
            dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.to_string().as_str())
                .map_err(tiff_err)?;
        }

        let offset = dir.write_data(raster.data.as_slice()).map_err(tiff_err)?;
        let offset = u32::try_from(offset)
            .map_err(|_| GisError::Raster("strip offset exceeds classic TIFF range".to_string()))?;
        dir.write_tag(Tag::StripOffsets, offset).map_err(tiff_err)?;
        dir.write_tag(Tag::StripByteCounts, strip_len).map_err(tiff_err)?;
        dir.finish().map_err(tiff_err)?;
    }

    Ok(buffer.into_inner())
}

/// Write `raster` to `path` as GeoTIFF.
pub fn write_geotiff(raster: &Raster, path: &Path) -> GisResult<()> {
    let bytes = encode_geotiff(raster)?;
    std::fs::write(path, bytes)?;
    debug!(
        path = %path.display(),
        width = raster.width,
        height = raster.height,
        "Wrote GeoTIFF"
    );
    Ok(())
}
