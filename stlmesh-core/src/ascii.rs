/// ASCII STL parser and writer
///
/// Grammar:
///
/// ```text
/// solid <name>
///   facet normal nx ny nz
///     outer loop
///       vertex x y z   (x3)
///     endloop
///   endfacet           (repeated)
/// endsolid <name>
/// ```
use nalgebra::{Point3, Vector3};
use nom::{
    bytes::complete::{take_till, take_till1, take_while},
    combinator::all_consuming,
    number::complete::float,
    IResult,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::LoadOptions;
use crate::error::{Found, LoadError, ParseError, Result};
use crate::facet::Facet;
use crate::format::strip_bom;

/// A grammar failure, positioned at the start of the offending token.
#[derive(Debug)]
struct SyntaxError<'a> {
    at: &'a str,
    expected: String,
    found: Found,
}

impl<'a> SyntaxError<'a> {
    fn new(at: &'a str, expected: impl Into<String>) -> Self {
        Self {
            at,
            expected: expected.into(),
            found: found_at(at),
        }
    }
}

impl<'a> nom::error::ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        SyntaxError::new(input, "token")
    }

    fn append(_input: &'a str, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

type ParseResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

fn found_at(input: &str) -> Found {
    match input.split_whitespace().next() {
        Some(token) => Found::Token(token.to_string()),
        None => Found::EndOfFile,
    }
}

fn fail<T>(at: &str, expected: impl Into<String>) -> ParseResult<'_, T> {
    Err(nom::Err::Failure(SyntaxError::new(at, expected)))
}

fn space(input: &str) -> ParseResult<'_, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

/// Next whitespace-delimited token, returned with the input positioned at its start.
fn token(input: &str) -> ParseResult<'_, (&str, &str)> {
    let (start, _) = space(input)?;
    match take_till1::<_, _, SyntaxError>(|c: char| c.is_whitespace())(start) {
        Ok((rest, word)) => Ok((rest, (start, word))),
        Err(_) => Ok((start, (start, ""))),
    }
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParseResult<'a, ()> {
    move |input| {
        let (rest, (start, found)) = token(input)?;
        if found == word {
            Ok((rest, ()))
        } else {
            fail(start, word)
        }
    }
}

/// Accept any of `words`, returning the one matched.
fn one_of<'a>(words: &'static [&'static str]) -> impl FnMut(&'a str) -> ParseResult<'a, &'static str> {
    move |input| {
        let (rest, (start, found)) = token(input)?;
        match words.iter().find(|word| **word == found) {
            Some(word) => Ok((rest, *word)),
            None => fail(start, words.join(" or ")),
        }
    }
}

fn number(input: &str) -> ParseResult<'_, f32> {
    let (rest, (start, text)) = token(input)?;
    match all_consuming(float::<&str, nom::error::Error<&str>>)(text) {
        Ok((_, value)) if value.is_finite() => Ok((rest, value)),
        _ => fail(start, "number"),
    }
}

fn vector3(input: &str) -> ParseResult<'_, [f32; 3]> {
    let (input, x) = number(input)?;
    let (input, y) = number(input)?;
    let (input, z) = number(input)?;
    Ok((input, [x, y, z]))
}

fn vertex(input: &str) -> ParseResult<'_, Point3<f32>> {
    let (input, ()) = keyword("vertex")(input)?;
    let (input, [x, y, z]) = vector3(input)?;
    Ok((input, Point3::new(x, y, z)))
}

/// Rest of the current line, used for the free-form solid name.
fn line_rest(input: &str) -> ParseResult<'_, &str> {
    let (input, name) = take_till(|c: char| c == '\n' || c == '\r')(input)?;
    Ok((input, name.trim()))
}

/// Everything after the `facet` keyword up to and including `endfacet`.
fn facet_body(input: &str) -> ParseResult<'_, Facet> {
    let (input, ()) = keyword("normal")(input)?;
    let (input, [nx, ny, nz]) = vector3(input)?;
    let (input, ()) = keyword("outer")(input)?;
    let (input, ()) = keyword("loop")(input)?;
    let (input, v1) = vertex(input)?;
    let (input, v2) = vertex(input)?;
    let (input, v3) = vertex(input)?;
    let (input, ()) = keyword("endloop")(input)?;
    let (input, ()) = keyword("endfacet")(input)?;

    Ok((input, Facet::new(Vector3::new(nx, ny, nz), [v1, v2, v3], 0)))
}

fn line_of(text: &str, at: &str) -> usize {
    let offset = text.len() - at.len();
    text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() + 1
}

fn to_parse_error(text: &str, err: nom::Err<SyntaxError<'_>>) -> LoadError {
    let err = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => SyntaxError::new(&text[text.len()..], "token"),
    };
    LoadError::Parse(ParseError {
        line: line_of(text, err.at),
        expected: err.expected,
        found: err.found,
    })
}

/// Parse an ASCII STL buffer into facets in file order.
pub fn decode(data: &[u8], options: &LoadOptions) -> Result<Vec<Facet>> {
    let data = strip_bom(data);
    let text = std::str::from_utf8(data).map_err(|e| {
        let valid = &data[..e.valid_up_to()];
        LoadError::Parse(ParseError {
            line: valid.iter().filter(|&&b| b == b'\n').count() + 1,
            expected: "text".to_string(),
            found: Found::InvalidUtf8,
        })
    })?;

    let (mut input, name) = parse_header(text).map_err(|e| to_parse_error(text, e))?;
    let mut facets = Vec::new();

    loop {
        let (rest, word) = one_of(&["facet", "endsolid"])(input).map_err(|e| to_parse_error(text, e))?;
        if word == "endsolid" {
            input = rest;
            break;
        }
        if facets.len() >= options.max_facets as usize {
            return Err(LoadError::TooManyFacets {
                declared: facets.len() as u64 + 1,
                limit: options.max_facets,
            });
        }
        let (rest, facet) = facet_body(rest).map_err(|e| to_parse_error(text, e))?;
        facets.push(facet);
        input = rest;
    }

    parse_trailer(input).map_err(|e| to_parse_error(text, e))?;

    tracing::debug!(solid = name, facets = facets.len(), "parsed ASCII STL");
    Ok(facets)
}

/// `solid` and its name. The name runs to the end of the line, or up to a
/// `facet` or `endsolid` token when the solid is written on one line.
fn parse_header(input: &str) -> ParseResult<'_, &str> {
    let (input, ()) = keyword("solid")(input)?;
    let (_, line) = take_till(|c: char| c == '\n' || c == '\r')(input)?;

    let mut rest = line;
    loop {
        let (next, (start, word)) = token(rest)?;
        if word.is_empty() {
            return line_rest(input);
        }
        if word == "facet" || word == "endsolid" {
            let name_len = line.len() - start.len();
            return Ok((&input[name_len..], input[..name_len].trim()));
        }
        rest = next;
    }
}

/// Closing solid name, then nothing but whitespace.
fn parse_trailer(input: &str) -> ParseResult<'_, ()> {
    let (input, _name) = line_rest(input)?;
    let (input, _) = space(input)?;
    if input.is_empty() {
        Ok((input, ()))
    } else {
        fail(input, "end of file")
    }
}

/// Write facets as ASCII STL under the given solid name.
///
/// Floats use the shortest representation that parses back to the same `f32`.
/// Non-finite values cannot be read back and are refused.
pub fn write<W: Write>(name: &str, facets: &[Facet], writer: &mut W) -> io::Result<()> {
    let name = name.lines().next().unwrap_or("").trim();

    if let Some(at) = facets
        .iter()
        .position(|f| !f.to_floats().iter().all(|v| v.is_finite()))
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("facet {} has a non-finite coordinate", at),
        ));
    }

    writeln!(writer, "solid {}", name)?;
    for facet in facets {
        let n = facet.normal;
        writeln!(writer, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for v in &facet.vertices {
            writeln!(writer, "      vertex {:e} {:e} {:e}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid {}", name)?;
    Ok(())
}

/// Save facets to `path` as ASCII STL.
pub fn save<P: AsRef<Path>>(path: P, name: &str, facets: &[Facet]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(name, facets, &mut writer)?;
    writer.flush()?;
    Ok(())
}
