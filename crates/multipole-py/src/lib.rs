//! # Multipole Python Bindings
//!
//! PyO3 bindings exposing octree construction and FMM operator assembly.
//!
//! ## Usage
//!
//! ```python
//! import numpy as np
//! import _multipole as fmm
//!
//! pts = np.random.rand(1000, 3) * 2 - 1
//! normals = pts / np.linalg.norm(pts, axis=1)[:, None]
//! tree = fmm.build_octree(32, pts, normals)
//! print(tree.total_points(), tree.stats())
//!
//! def kernel(obs_pts, obs_ns, src_pts, src_ns):
//!     r = np.linalg.norm(obs_pts[:, None, :] - src_pts[None, :, :], axis=2)
//!     with np.errstate(divide="ignore"):
//!         out = 1.0 / (4 * np.pi * r)
//!     out[r == 0] = 0.0
//!     return out
//!
//! up = fmm.upward(tree, kernel, order=5)
//! mats = fmm.assemble(tree, tree, kernel, upward=up)
//! p2p = mats.p2p
//! print(p2p.rows().shape, mats.n_m_dofs)
//! ```

use std::sync::Arc;

use faer::Mat;
use glam::DVec3;
use multipole::kernel::{laplace_single_layer, PointSet};
use multipole::{ExpansionSurface, FmmConfig, FmmError, FmmMat, Kernel, SparseMat, Upward};
use numpy::ndarray::{Array2, Ix2};
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArrayDyn, ToPyArray};
use octant::{NodeData, Octree, OctreeConfig, OctreeError, OctreeNode};
use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// Read an `N x 3` float64 array into vectors.
fn read_vectors(name: &str, arr: &PyReadonlyArrayDyn<'_, f64>) -> PyResult<Vec<DVec3>> {
    let view = arr.as_array();
    let shape = view.shape().to_vec();
    let rows = view
        .into_dimensionality::<Ix2>()
        .ok()
        .filter(|rows| rows.ncols() == 3)
        .ok_or_else(|| PyValueError::new_err(format!("{name} must be an N x 3 array, got shape {shape:?}")))?;
    Ok(rows
        .rows()
        .into_iter()
        .map(|row| DVec3::new(row[0], row[1], row[2]))
        .collect())
}

fn vectors_to_array(vectors: &[DVec3]) -> Array2<f64> {
    Array2::from_shape_fn((vectors.len(), 3), |(i, j)| vectors[i][j])
}

fn tuple(v: DVec3) -> (f64, f64, f64) {
    (v.x, v.y, v.z)
}

fn octree_err(err: OctreeError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn fmm_err(err: FmmError) -> PyErr {
    match err {
        FmmError::Kernel(_) | FmmError::BlockShape { .. } | FmmError::Svd(_) => {
            PyRuntimeError::new_err(err.to_string())
        }
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// Kernel implemented by a Python callable
/// `(obs_pts, obs_normals, src_pts, src_normals) -> ndarray[n_obs, n_src]`.
struct PyKernel {
    callable: PyObject,
}

impl Kernel for PyKernel {
    fn block(&self, obs: PointSet<'_>, src: PointSet<'_>) -> Result<Mat<f64>, FmmError> {
        Python::with_gil(|py| {
            let args = (
                vectors_to_array(obs.pts).to_pyarray(py),
                vectors_to_array(obs.normals).to_pyarray(py),
                vectors_to_array(src.pts).to_pyarray(py),
                vectors_to_array(src.normals).to_pyarray(py),
            );
            let result = self
                .callable
                .call1(py, args)
                .map_err(|err| FmmError::Kernel(err.to_string()))?
                .into_bound(py);
            let block = result
                .extract::<PyReadonlyArray2<'_, f64>>()
                .map_err(|err| FmmError::Kernel(format!("kernel must return a 2-D float64 array: {err}")))?;
            let view = block.as_array();
            Ok(Mat::from_fn(view.nrows(), view.ncols(), |i, j| view[[i, j]]))
        })
    }
}

/// Built-in kernel name or Python callable.
#[derive(FromPyObject)]
enum KernelArg {
    Name(String),
    Callable(PyObject),
}

/// Axis-aligned box.
#[pyclass(name = "Bounds", frozen)]
#[derive(Clone, Copy)]
pub struct PyBounds {
    inner: octant::Bounds,
}

#[pymethods]
impl PyBounds {
    /// Box center.
    #[getter]
    fn center(&self) -> (f64, f64, f64) {
        tuple(self.inner.center)
    }

    /// Half side length along each axis.
    #[getter]
    fn half_width(&self) -> (f64, f64, f64) {
        tuple(self.inner.half_width)
    }

    fn __repr__(&self) -> String {
        format!(
            "Bounds(center={:?}, half_width={:?})",
            self.center(),
            self.half_width()
        )
    }
}

/// Structural statistics of a tree.
#[pyclass(name = "OctreeStats", get_all, frozen)]
#[derive(Clone, Copy)]
pub struct PyOctreeStats {
    node_count: usize,
    leaf_count: usize,
    max_depth: u8,
}

#[pymethods]
impl PyOctreeStats {
    fn __repr__(&self) -> String {
        format!(
            "OctreeStats(node_count={}, leaf_count={}, max_depth={})",
            self.node_count, self.leaf_count, self.max_depth
        )
    }
}

/// Immutable octree.
#[pyclass(name = "Octree", frozen)]
pub struct PyOctree {
    inner: Arc<Octree>,
}

#[pymethods]
impl PyOctree {
    /// Root node.
    #[getter]
    fn root(&self) -> PyOctreeNode {
        PyOctreeNode {
            tree: Arc::clone(&self.inner),
            path: Vec::new(),
        }
    }

    /// Sum of leaf point counts.
    fn total_points(&self) -> usize {
        self.inner.total_points()
    }

    /// Node, leaf and depth counts.
    fn stats(&self) -> PyOctreeStats {
        let stats = self.inner.stats();
        PyOctreeStats {
            node_count: stats.node_count,
            leaf_count: stats.leaf_count,
            max_depth: stats.max_depth,
        }
    }

    /// Structural hash; equal for trees built from equal inputs.
    fn hash(&self) -> u64 {
        octant::hash_octree(&self.inner)
    }

    fn __repr__(&self) -> String {
        format!("Octree(total_points={})", self.inner.total_points())
    }
}

/// A node of an [`PyOctree`], addressed by its octant path from the root.
#[pyclass(name = "OctreeNode", frozen)]
pub struct PyOctreeNode {
    tree: Arc<Octree>,
    path: Vec<u8>,
}

impl PyOctreeNode {
    fn node(&self) -> &OctreeNode {
        // Paths are only ever extended through `child`, which checks them.
        self.path
            .iter()
            .fold(self.tree.root(), |node, &k| node.child(usize::from(k)).unwrap_or(node))
    }
}

#[pymethods]
impl PyOctreeNode {
    /// Node box.
    #[getter]
    fn bounds(&self) -> PyBounds {
        PyBounds {
            inner: self.node().bounds,
        }
    }

    /// True for leaves.
    #[getter]
    fn is_leaf(&self) -> bool {
        self.node().is_leaf()
    }

    /// Depth below the root.
    #[getter]
    fn depth(&self) -> u8 {
        self.node().depth
    }

    /// Number of points at or below this node.
    #[getter]
    fn n_points(&self) -> usize {
        self.node().n_points()
    }

    /// Points at or below this node, `N x 3`.
    #[getter]
    fn pts<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        vectors_to_array(&self.node().collect_data().pts).to_pyarray(py)
    }

    /// Normals matching [`Self::pts`], `N x 3`.
    #[getter]
    fn normals<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        vectors_to_array(&self.node().collect_data().normals).to_pyarray(py)
    }

    /// Input row of each entry of [`Self::pts`].
    #[getter]
    fn original_indices<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<usize>> {
        self.node().collect_data().original_indices.to_pyarray(py)
    }

    /// Child in octant `i`.
    fn child(&self, i: usize) -> PyResult<PyOctreeNode> {
        if self.node().is_leaf() {
            return Err(PyValueError::new_err("leaf nodes have no children"));
        }
        let octant = u8::try_from(i)
            .ok()
            .filter(|&k| k < 8)
            .ok_or_else(|| PyIndexError::new_err(format!("child index {i} out of range 0..8")))?;
        let mut path = self.path.clone();
        path.push(octant);
        Ok(PyOctreeNode {
            tree: Arc::clone(&self.tree),
            path,
        })
    }

    fn __repr__(&self) -> String {
        let node = self.node();
        format!(
            "OctreeNode(depth={}, is_leaf={}, n_points={})",
            node.depth,
            node.is_leaf(),
            node.n_points()
        )
    }
}

/// Coordinate-format operator.
#[pyclass(name = "SparseMat", frozen)]
pub struct PySparseMat {
    inner: SparseMat,
}

#[pymethods]
impl PySparseMat {
    /// Row of each entry.
    fn rows<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<usize>> {
        self.inner.rows.to_pyarray(py)
    }

    /// Column of each entry.
    fn cols<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<usize>> {
        self.inner.cols.to_pyarray(py)
    }

    /// Value of each entry.
    fn vals<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<f64>> {
        self.inner.vals.to_pyarray(py)
    }

    /// Smallest shape holding every entry.
    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// The four FMM operators.
#[pyclass(name = "FmmMat", frozen)]
pub struct PyFmmMat {
    inner: FmmMat,
}

#[pymethods]
impl PyFmmMat {
    /// Near-field operator.
    #[getter]
    fn p2p(&self) -> PySparseMat {
        PySparseMat {
            inner: self.inner.p2p.clone(),
        }
    }

    /// Point-to-multipole operator.
    #[getter]
    fn p2m(&self) -> PySparseMat {
        PySparseMat {
            inner: self.inner.p2m.clone(),
        }
    }

    /// Multipole-to-point operator.
    #[getter]
    fn m2p(&self) -> PySparseMat {
        PySparseMat {
            inner: self.inner.m2p.clone(),
        }
    }

    /// Multipole-to-multipole operator.
    #[getter]
    fn m2m(&self) -> PySparseMat {
        PySparseMat {
            inner: self.inner.m2m.clone(),
        }
    }

    /// Total multipole degrees of freedom.
    #[getter]
    fn n_m_dofs(&self) -> usize {
        self.inner.n_m_dofs
    }

    /// Apply all four operators to source strengths.
    fn apply<'py>(&self, py: Python<'py>, x: PyReadonlyArray1<'py, f64>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let x = x.as_array().to_vec();
        let y = py
            .allow_threads(|| self.inner.apply(&x))
            .map_err(fmm_err)?;
        Ok(y.to_pyarray(py))
    }
}

/// Build an octree over `pts` with one normal per point.
#[pyfunction]
#[pyo3(signature = (max_pts_per_cell, pts, normals, max_depth=32))]
fn build_octree(
    py: Python<'_>,
    max_pts_per_cell: usize,
    pts: PyReadonlyArrayDyn<'_, f64>,
    normals: PyReadonlyArrayDyn<'_, f64>,
    max_depth: u8,
) -> PyResult<PyOctree> {
    let pts = read_vectors("pts", &pts)?;
    let normals = read_vectors("normals", &normals)?;
    let data = NodeData::new(pts, normals).map_err(octree_err)?;
    let config = OctreeConfig {
        max_pts_per_cell,
        max_depth,
    };
    let tree = py
        .allow_threads(|| Octree::build(config, data))
        .map_err(octree_err)?;
    Ok(PyOctree {
        inner: Arc::new(tree),
    })
}

impl KernelArg {
    fn resolve(self) -> PyResult<KernelChoice> {
        match self {
            KernelArg::Name(name) if name == "laplace" => Ok(KernelChoice::Laplace),
            KernelArg::Name(name) => Err(PyValueError::new_err(format!("unknown kernel {name:?}"))),
            KernelArg::Callable(callable) => Ok(KernelChoice::Python(PyKernel { callable })),
        }
    }
}

enum KernelChoice {
    Laplace,
    Python(PyKernel),
}

impl KernelChoice {
    fn as_kernel(&self) -> &dyn Kernel {
        match self {
            KernelChoice::Laplace => &laplace_single_layer,
            KernelChoice::Python(kernel) => kernel,
        }
    }
}

fn settings(
    order: usize,
    inner_r: f64,
    outer_r: f64,
    mac: f64,
    surface: Option<PyReadonlyArrayDyn<'_, f64>>,
) -> PyResult<(FmmConfig, ExpansionSurface)> {
    let config = FmmConfig {
        order,
        inner_r,
        outer_r,
        mac,
        ..Default::default()
    };
    let surface = match surface {
        Some(points) => ExpansionSurface::from_points(read_vectors("surface", &points)?),
        None => ExpansionSurface::grid(order),
    }
    .map_err(fmm_err)?;
    Ok((config, surface))
}

/// Upward pass of one source tree, reusable across assemblies.
#[pyclass(name = "Upward", frozen)]
pub struct PyUpward {
    inner: Upward,
    tree: Arc<Octree>,
    surface: ExpansionSurface,
    config: FmmConfig,
}

#[pymethods]
impl PyUpward {
    /// Nodes covered, equal to the source tree's node count.
    #[getter]
    fn n_nodes(&self) -> usize {
        self.inner.n_nodes()
    }

    /// Points per expansion surface.
    #[getter]
    fn n_surf(&self) -> usize {
        self.surface.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Upward(n_nodes={}, n_surf={}, order={})",
            self.inner.n_nodes(),
            self.surface.len(),
            self.config.order
        )
    }
}

/// Run the upward pass over `src_tree`.
///
/// `kernel` is either `"laplace"` or a callable
/// `(obs_pts, obs_normals, src_pts, src_normals) -> ndarray[n_obs, n_src]`.
/// `surface` optionally replaces the grid surface with custom unit-scale points.
#[pyfunction]
#[pyo3(signature = (src_tree, kernel, order=5, inner_r=1.05, outer_r=2.95, mac=3.0, surface=None))]
#[allow(clippy::too_many_arguments)]
fn upward(
    py: Python<'_>,
    src_tree: &PyOctree,
    kernel: KernelArg,
    order: usize,
    inner_r: f64,
    outer_r: f64,
    mac: f64,
    surface: Option<PyReadonlyArrayDyn<'_, f64>>,
) -> PyResult<PyUpward> {
    let (config, surface) = settings(order, inner_r, outer_r, mac, surface)?;
    let kernel = kernel.resolve()?;
    let tree = Arc::clone(&src_tree.inner);
    let inner = py
        .allow_threads(|| Upward::compute(&tree, &surface, kernel.as_kernel(), &config))
        .map_err(fmm_err)?;
    Ok(PyUpward {
        inner,
        tree,
        surface,
        config,
    })
}

/// Assemble the FMM operators between `obs_tree` and `src_tree`.
///
/// Without `upward`, the upward pass of `src_tree` is computed first from
/// `order`, `inner_r`, `outer_r` and `surface`. With `upward` (from
/// [`upward`] on the same `src_tree`), its surface and radii are reused and
/// those arguments are ignored; `mac` still applies.
#[pyfunction]
#[pyo3(signature = (obs_tree, src_tree, kernel, order=5, inner_r=1.05, outer_r=2.95, mac=3.0, surface=None, upward=None))]
#[allow(clippy::too_many_arguments)]
fn assemble(
    py: Python<'_>,
    obs_tree: &PyOctree,
    src_tree: &PyOctree,
    kernel: KernelArg,
    order: usize,
    inner_r: f64,
    outer_r: f64,
    mac: f64,
    surface: Option<PyReadonlyArrayDyn<'_, f64>>,
    upward: Option<PyRef<'_, PyUpward>>,
) -> PyResult<PyFmmMat> {
    let kernel = kernel.resolve()?;
    let (obs, src) = (Arc::clone(&obs_tree.inner), Arc::clone(&src_tree.inner));

    let fmm = match upward {
        Some(up) => {
            let up: &PyUpward = &up;
            if !Arc::ptr_eq(&up.tree, &src) {
                return Err(PyValueError::new_err("upward was computed for a different source tree"));
            }
            let config = FmmConfig { mac, ..up.config };
            py.allow_threads(|| {
                multipole::assemble(&obs, &src, &up.inner, &up.surface, kernel.as_kernel(), &config)
            })
        }
        None => {
            let (config, surface) = settings(order, inner_r, outer_r, mac, surface)?;
            py.allow_threads(|| {
                let kernel = kernel.as_kernel();
                let upward = Upward::compute(&src, &surface, kernel, &config)?;
                multipole::assemble(&obs, &src, &upward, &surface, kernel, &config)
            })
        }
    }
    .map_err(fmm_err)?;
    Ok(PyFmmMat { inner: fmm })
}

/// Python module definition.
#[pymodule]
fn _multipole(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyBounds>()?;
    m.add_class::<PyOctree>()?;
    m.add_class::<PyOctreeNode>()?;
    m.add_class::<PyOctreeStats>()?;
    m.add_class::<PySparseMat>()?;
    m.add_class::<PyFmmMat>()?;
    m.add_class::<PyUpward>()?;
    m.add_function(wrap_pyfunction!(build_octree, m)?)?;
    m.add_function(wrap_pyfunction!(upward, m)?)?;
    m.add_function(wrap_pyfunction!(assemble, m)?)?;
    Ok(())
}
