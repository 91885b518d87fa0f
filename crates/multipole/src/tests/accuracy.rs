//! FMM results against dense all-pairs evaluation.

use crate::direct;
use crate::kernel::{laplace_single_layer, PointSet};
use crate::{assemble, self_interaction, ExpansionSurface, FmmConfig, Upward};

use super::helpers::{ball, build, relative_error, strengths, two_clusters, CLUSTER_A, CLUSTER_B};

#[test]
fn test_single_leaf_is_exact() {
    let data = ball(CLUSTER_A, 0.15, 40, 11);
    let tree = build(&data, 64);
    assert!(tree.root().is_leaf());

    let fmm = self_interaction(&tree, &laplace_single_layer, &FmmConfig::with_order(3)).unwrap();
    assert!(fmm.m2p.is_empty());
    assert!(fmm.m2m.is_empty());
    assert_eq!(fmm.p2p.len(), 40 * 40);

    let x = strengths(40, 12);
    let set = PointSet::new(&data.pts, &data.normals);
    let expected = direct::apply(&laplace_single_layer, set, set, &x).unwrap();
    let got = fmm.apply(&x).unwrap();
    assert!(relative_error(&got, &expected) < 1e-12);
}

#[test]
fn test_two_clusters_match_direct() {
    let data = two_clusters(150, 21);
    let tree = build(&data, 64);
    let fmm = self_interaction(&tree, &laplace_single_layer, &FmmConfig::with_order(5)).unwrap();
    assert!(!fmm.m2p.is_empty(), "clusters should interact through multipoles");
    assert!(!fmm.p2p.is_empty());

    let x = strengths(300, 22);
    let set = PointSet::new(&data.pts, &data.normals);
    let expected = direct::apply(&laplace_single_layer, set, set, &x).unwrap();
    let got = fmm.apply(&x).unwrap();
    assert!(relative_error(&got, &expected) < 1e-3);
}

#[test]
fn test_far_field_only() {
    // Separate observation and source trees far enough apart that the
    // roots already pass the acceptance test.
    let obs = ball(CLUSTER_A, 0.15, 80, 31);
    let src = ball(CLUSTER_B, 0.15, 150, 32);
    let obs_tree = build(&obs, 16);
    let src_tree = build(&src, 16);

    let config = FmmConfig::with_order(5);
    let surface = ExpansionSurface::grid(config.order).unwrap();
    let upward = Upward::compute(&src_tree, &surface, &laplace_single_layer, &config).unwrap();
    let fmm = assemble(&obs_tree, &src_tree, &upward, &surface, &laplace_single_layer, &config).unwrap();
    assert!(fmm.p2p.is_empty());
    assert_eq!(fmm.m2p.len(), 80 * surface.len());

    let x = strengths(150, 33);
    let expected = direct::apply(
        &laplace_single_layer,
        PointSet::new(&obs.pts, &obs.normals),
        PointSet::new(&src.pts, &src.normals),
        &x,
    )
    .unwrap();
    let got = fmm.apply(&x).unwrap();
    assert_eq!(got.len(), 80);
    assert!(relative_error(&got, &expected) < 1e-4);
}

#[test]
fn test_higher_order_is_more_accurate() {
    let data = two_clusters(100, 41);
    let tree = build(&data, 32);
    let x = strengths(200, 42);
    let set = PointSet::new(&data.pts, &data.normals);
    let expected = direct::apply(&laplace_single_layer, set, set, &x).unwrap();

    let error = |order| {
        let fmm = self_interaction(&tree, &laplace_single_layer, &FmmConfig::with_order(order)).unwrap();
        relative_error(&fmm.apply(&x).unwrap(), &expected)
    };
    let coarse = error(2);
    let fine = error(5);
    assert!(fine < coarse, "order 5 error {fine} not below order 2 error {coarse}");
}
