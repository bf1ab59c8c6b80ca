use std::io::{Cursor, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::Array2;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{CalibError, Result};
use crate::xnml::document::XnmlDocument;

const FORMAT_VERSION: &str = "1.0";

/// Serialize a document to an XNML byte string. `compress` selects whether
/// matrix payloads are deflated before base64 encoding (default on).
pub fn write_document(doc: &XnmlDocument, compress: bool) -> Result<Vec<u8>> {
    doc.validate()?;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new("XNML");
    root.push_attribute(("version", FORMAT_VERSION));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;

    write_text_element(&mut writer, "ReferenceImage", &doc.reference_image)?;
    write_text_element(&mut writer, "TargetImage", &doc.target_image)?;
    write_text_element(&mut writer, "NormalizationScale", &doc.normalization_scale.to_string())?;

    let mut geometry = BytesStart::new("ReferenceGeometry");
    geometry.push_attribute(("width", doc.reference_width.to_string().as_str()));
    geometry.push_attribute(("height", doc.reference_height.to_string().as_str()));
    writer
        .write_event(Event::Empty(geometry))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;

    write_text_element(&mut writer, "CreationTime", &doc.creation_time)?;

    write_matrix_group(&mut writer, "A", &doc.a, compress)?;
    write_matrix_group(&mut writer, "B", &doc.b, compress)?;

    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new("XNML")))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;

    Ok(writer.into_inner().into_inner())
}

fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, value: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;
    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(name)))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;
    Ok(())
}

fn write_matrix_group(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    tag: &str,
    matrices: &[Array2<f64>],
    compress: bool,
) -> Result<()> {
    let mut group = BytesStart::new(tag);
    group.push_attribute(("channels", matrices.len().to_string().as_str()));
    writer
        .write_event(Event::Start(group))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;

    for (index, matrix) in matrices.iter().enumerate() {
        let (height, width) = matrix.dim();
        let raw = encode_raw(matrix);
        let checksum = crc32fast::hash(&raw);

        let (payload, stored_compressed) = if compress {
            (deflate(&raw)?, true)
        } else {
            (raw.clone(), false)
        };
        let base64_payload = BASE64.encode(&payload);

        let mut element = BytesStart::new("Matrix");
        element.push_attribute(("channel", index.to_string().as_str()));
        element.push_attribute(("width", width.to_string().as_str()));
        element.push_attribute(("height", height.to_string().as_str()));
        element.push_attribute(("compressed", stored_compressed.to_string().as_str()));
        if stored_compressed {
            element.push_attribute(("codec", "zlib"));
            element.push_attribute(("uncompressedLength", raw.len().to_string().as_str()));
        }
        element.push_attribute(("checksum", checksum.to_string().as_str()));

        writer
            .write_event(Event::Start(element))
            .map_err(|e| CalibError::Xnml(e.to_string()))?;
        writer
            .write_event(Event::Text(BytesText::new(&base64_payload)))
            .map_err(|e| CalibError::Xnml(e.to_string()))?;
        writer
            .write_event(Event::End(quick_xml::events::BytesEnd::new("Matrix")))
            .map_err(|e| CalibError::Xnml(e.to_string()))?;
    }

    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(tag)))
        .map_err(|e| CalibError::Xnml(e.to_string()))?;
    Ok(())
}

fn encode_raw(matrix: &Array2<f64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(matrix.len() * 8);
    for v in matrix.iter() {
        buf.write_f64::<LittleEndian>(*v).expect("vec write cannot fail");
    }
    buf
}

fn decode_raw(bytes: &[u8], height: usize, width: usize) -> Result<Array2<f64>> {
    let expected = height * width * 8;
    if bytes.len() != expected {
        return Err(CalibError::Xnml(format!(
            "matrix payload is {} bytes, expected {expected} for {height}x{width}",
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    let mut data = Vec::with_capacity(height * width);
    for _ in 0..height * width {
        data.push(
            cursor
                .read_f64::<LittleEndian>()
                .map_err(|e| CalibError::Xnml(e.to_string()))?,
        );
    }
    Array2::from_shape_vec((height, width), data).map_err(|e| CalibError::Xnml(e.to_string()))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(CalibError::Io)?;
    encoder.finish().map_err(CalibError::Io)
}

fn inflate(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut out).map_err(CalibError::Io)?;
    Ok(out)
}

/// Parse an XNML byte string into a document, validating matrix dimensions,
/// checksums, and the shape/channel-count agreement between `A` and `B`.
pub fn read_document(bytes: &[u8]) -> Result<XnmlDocument> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut reference_image = String::new();
    let mut target_image = String::new();
    let mut normalization_scale: u32 = 0;
    let mut reference_width: u32 = 0;
    let mut reference_height: u32 = 0;
    let mut creation_time = String::new();
    let mut a_matrices: Vec<Array2<f64>> = Vec::new();
    let mut b_matrices: Vec<Array2<f64>> = Vec::new();

    let mut stack: Vec<String> = Vec::new();
    let mut current_group: Option<String> = None;
    let mut current_text = String::new();
    let mut matrix_width = 0usize;
    let mut matrix_height = 0usize;
    let mut matrix_compressed = false;
    let mut matrix_uncompressed_len = 0usize;
    let mut matrix_checksum: u32 = 0;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(|e| CalibError::Xnml(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "ReferenceGeometry" {
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().map_err(|err| CalibError::Xnml(err.to_string()))?;
                        match attr.key.as_ref() {
                            b"width" => reference_width = parse_u32(&value)?,
                            b"height" => reference_height = parse_u32(&value)?,
                            _ => {}
                        }
                    }
                } else if name == "A" || name == "B" {
                    current_group = Some(name.clone());
                } else if name == "Matrix" {
                    matrix_width = 0;
                    matrix_height = 0;
                    matrix_compressed = false;
                    matrix_uncompressed_len = 0;
                    matrix_checksum = 0;
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().map_err(|err| CalibError::Xnml(err.to_string()))?;
                        match attr.key.as_ref() {
                            b"width" => matrix_width = parse_u32(&value)? as usize,
                            b"height" => matrix_height = parse_u32(&value)? as usize,
                            b"compressed" => matrix_compressed = value == "true",
                            b"uncompressedLength" => matrix_uncompressed_len = parse_u32(&value)? as usize,
                            b"checksum" => matrix_checksum = value.parse().unwrap_or(0),
                            _ => {}
                        }
                    }
                }
                current_text.clear();
                stack.push(name);
            }
            Event::Text(t) => {
                current_text.push_str(&t.unescape().map_err(|e| CalibError::Xnml(e.to_string()))?);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "ReferenceImage" => reference_image = current_text.trim().to_string(),
                    "TargetImage" => target_image = current_text.trim().to_string(),
                    "NormalizationScale" => normalization_scale = parse_u32(current_text.trim())?,
                    "CreationTime" => creation_time = current_text.trim().to_string(),
                    "Matrix" => {
                        let payload = BASE64
                            .decode(current_text.trim())
                            .map_err(|e| CalibError::Xnml(e.to_string()))?;
                        let raw = if matrix_compressed {
                            inflate(&payload, matrix_uncompressed_len)?
                        } else {
                            payload
                        };
                        if crc32fast::hash(&raw) != matrix_checksum {
                            return Err(CalibError::Xnml("matrix checksum mismatch".to_string()));
                        }
                        let matrix = decode_raw(&raw, matrix_height, matrix_width)?;
                        match current_group.as_deref() {
                            Some("A") => a_matrices.push(matrix),
                            Some("B") => b_matrices.push(matrix),
                            _ => return Err(CalibError::Xnml("Matrix element outside A/B group".to_string())),
                        }
                    }
                    "A" | "B" => current_group = None,
                    _ => {}
                }
                current_text.clear();
                stack.pop();
            }
            _ => {}
        }
        buf.clear();
    }

    let doc = XnmlDocument {
        reference_image,
        target_image,
        normalization_scale,
        reference_width,
        reference_height,
        creation_time,
        a: a_matrices,
        b: b_matrices,
    };
    doc.validate()?;
    Ok(doc)
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse().map_err(|_| CalibError::Xnml(format!("expected an integer, got '{s}'")))
}
