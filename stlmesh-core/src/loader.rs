/// Loading pipeline and the model handle
use std::path::Path;
use std::sync::Arc;

use crate::ascii;
use crate::binary;
use crate::config::LoadOptions;
use crate::error::{LoadError, Result};
use crate::facet::{Facet, MeshBuffer};
use crate::format::Format;

/// Load an STL file with default options.
pub fn load<P: AsRef<Path>>(path: P) -> Result<MeshBuffer> {
    load_with(path, &LoadOptions::default())
}

/// Load an STL file.
///
/// Fails with `LoadError::Io` if the file cannot be read or is empty, before
/// any format detection takes place.
pub fn load_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<MeshBuffer> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "read STL file");
    load_bytes_with(&data, options)
}

/// Decode an in-memory STL buffer with default options.
pub fn load_bytes(data: &[u8]) -> Result<MeshBuffer> {
    load_bytes_with(data, &LoadOptions::default())
}

/// Decode an in-memory STL buffer: detect, decode, then validate.
pub fn load_bytes_with(data: &[u8], options: &LoadOptions) -> Result<MeshBuffer> {
    if data.is_empty() {
        return Err(LoadError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "STL input is empty",
        )));
    }

    let format = Format::detect(data, options)?;
    tracing::debug!(?format, "detected STL format");

    let facets = match format {
        Format::Binary => binary::decode(data, options)?,
        Format::Ascii => ascii::decode(data, options)?,
    };

    MeshBuffer::new(facets)
}

/// Terminal state of a model. Loading happens inside the constructor and is
/// never observable.
#[derive(Debug, Clone, Default)]
enum LoadState {
    #[default]
    Unloaded,
    Loaded(MeshBuffer),
    Failed(Arc<LoadError>),
}

/// A loaded STL model.
///
/// Construction never fails: a bad file yields an invalid model whose
/// `facets()` is empty and whose `error()` holds the diagnostic. Clones share
/// the facet storage.
#[derive(Debug, Clone, Default)]
pub struct StlModel {
    state: LoadState,
}

impl StlModel {
    /// Load `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::open_with(path, &LoadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Self {
        let path = path.as_ref();
        let result = load_with(path, options);
        if let Err(e) = &result {
            tracing::warn!(path = %path.display(), kind = e.kind(), error = %e, "failed to load STL");
        }
        Self::from_result(result)
    }

    /// Decode an in-memory buffer with default options.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_bytes_with(data, &LoadOptions::default())
    }

    pub fn from_bytes_with(data: &[u8], options: &LoadOptions) -> Self {
        let result = load_bytes_with(data, options);
        if let Err(e) = &result {
            tracing::warn!(kind = e.kind(), error = %e, "failed to decode STL buffer");
        }
        Self::from_result(result)
    }

    fn from_result(result: Result<MeshBuffer>) -> Self {
        let state = match result {
            Ok(mesh) => LoadState::Loaded(mesh),
            Err(e) => LoadState::Failed(Arc::new(e)),
        };
        Self { state }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.state, LoadState::Loaded(_))
    }

    /// The loaded facets in file order; empty unless the model is valid.
    pub fn facets(&self) -> &[Facet] {
        match &self.state {
            LoadState::Loaded(mesh) => mesh.as_slice(),
            _ => &[],
        }
    }

    pub fn mesh(&self) -> Option<&MeshBuffer> {
        match &self.state {
            LoadState::Loaded(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Why the load failed, if it did.
    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            LoadState::Failed(e) => Some(&**e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{HEADER_LEN, PREAMBLE_LEN, RECORD_LEN};
    use nalgebra::{Point3, Vector3};

    fn binary_file(count: u32, records: usize) -> Vec<u8> {
        let mut data = vec![0u8; PREAMBLE_LEN + records * RECORD_LEN];
        data[HEADER_LEN..PREAMBLE_LEN].copy_from_slice(&count.to_le_bytes());
        data
    }

    fn scenario_file() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data.extend_from_slice(&1u32.to_le_bytes());
        for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data.extend_from_slice(&[0, 0]);
        data
    }

    #[test]
    fn test_default_is_unloaded() {
        let model = StlModel::default();
        assert!(!model.is_valid());
        assert!(model.facets().is_empty());
        assert!(model.error().is_none());
    }

    #[test]
    fn test_single_facet_scenario() {
        let model = StlModel::from_bytes(&scenario_file());
        assert!(model.is_valid());
        assert_eq!(model.facets().len(), 1);

        let facet = &model.facets()[0];
        assert_eq!(facet.normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(facet.vertices[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(facet.vertices[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(facet.vertices[2], Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_zero_facets_is_invalid() {
        let model = StlModel::from_bytes(&binary_file(0, 0));
        assert!(!model.is_valid());
        assert!(model.facets().is_empty());
        assert!(matches!(model.error(), Some(LoadError::EmptyMesh)));

        let model = StlModel::from_bytes(b"solid empty\nendsolid empty\n");
        assert!(matches!(model.error(), Some(LoadError::EmptyMesh)));
    }

    #[test]
    fn test_truncated_is_invalid() {
        let model = StlModel::from_bytes(&binary_file(5, 3));
        assert!(!model.is_valid());
        assert!(model.facets().is_empty());
        assert!(matches!(
            model.error(),
            Some(LoadError::Truncated { declared: 5, .. })
        ));
    }

    #[test]
    fn test_empty_input_is_io_error() {
        assert!(matches!(load_bytes(&[]), Err(LoadError::Io(_))));
    }

    #[test]
    fn test_unrecognized_input() {
        let model = StlModel::from_bytes(b"not an stl file");
        assert!(matches!(model.error(), Some(LoadError::Format(_))));
    }

    #[test]
    fn test_long_unrecognized_input() {
        let notes = "Build notes\n===========\n\nThe bracket is printed in PETG at 0.2 mm layers with 4 perimeters and 30% gyroid infill.\n";
        let model = StlModel::from_bytes(notes.as_bytes());
        assert!(!model.is_valid());
        assert!(matches!(model.error(), Some(LoadError::Format(_))));

        let mut image = b"\x89PNG\r\n\x1a\n".to_vec();
        image.resize(300, 0x41);
        let model = StlModel::from_bytes(&image);
        assert!(matches!(model.error(), Some(LoadError::Format(_))));
    }

    #[test]
    fn test_byte_order_mark_ascii() {
        let mut data = b"\xEF\xBB\xBF".to_vec();
        data.extend_from_slice(
            b"solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid t\n",
        );
        let model = StlModel::from_bytes(&data);
        assert!(model.is_valid());
        assert_eq!(model.facets().len(), 1);
    }

    #[test]
    fn test_model_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StlModel>();
        assert_send_sync::<MeshBuffer>();
    }

    #[test]
    fn test_binary_count_matches_header() {
        let mesh = load_bytes(&binary_file(4, 4)).unwrap();
        assert_eq!(mesh.len(), 4);
    }

    #[test]
    fn test_clone_shares_facets() {
        let model = StlModel::from_bytes(&scenario_file());
        let copy = model.clone();
        assert!(std::ptr::eq(model.facets(), copy.facets()));
        drop(model);
        assert!(copy.is_valid());
        assert_eq!(copy.facets().len(), 1);
    }
}
