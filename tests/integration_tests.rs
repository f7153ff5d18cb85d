use geotrie::{
    Config, DimType, Dimension, Duplicates, Point, Reader, Schema, Tree, TreeBuilder, Writer,
};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn xyz_schema() -> Arc<Schema> {
    let mut schema = Schema::new();
    schema
        .add_dimension(Dimension::new("X", "longitude", DimType::Double, 1.0, 0.0).unwrap())
        .unwrap();
    schema
        .add_dimension(Dimension::new("Y", "latitude", DimType::Double, 1.0, 0.0).unwrap())
        .unwrap();
    schema
        .add_dimension(Dimension::new("Z", "elevation", DimType::Double, 0.01, 0.0).unwrap())
        .unwrap();
    Arc::new(schema)
}

fn three_point_tree(schema: &Arc<Schema>) -> Tree {
    let mut builder = TreeBuilder::new(schema.clone()).resolution(8);
    builder.add_point(&Point::new(0.0, 0.0), &[("Z", 1.0)]).unwrap();
    builder
        .add_point(&Point::new(0.0001, 0.0001), &[("Z", 1.5)])
        .unwrap();
    builder.add_point(&Point::new(45.0, 45.0), &[("Z", 99.9)]).unwrap();
    builder.build().unwrap()
}

#[test]
fn test_three_distinct_points() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    assert_eq!(tree.num_points(), 3);
    assert_eq!(tree.count_leaves(), 3);
    // Z values differ, so nothing compacts to the root
    assert!(tree.root().attribute(2).is_none());
}

#[test]
fn test_uniform_payload_compacts_to_root() {
    let schema = xyz_schema();
    let mut builder = TreeBuilder::new(schema.clone()).resolution(8);
    for i in 0..100 {
        let point = Point::new(-170.0 + i as f64 * 3.0, -80.0 + (i % 50) as f64 * 3.0);
        builder.add_point(&point, &[("Z", 5.0)]).unwrap();
    }
    let tree = builder.build().unwrap();

    let z = schema.dimension_by_name("Z").unwrap();
    let root_z = tree.root().attribute(2).expect("Z should sit on the root");
    assert!((root_z.value(z) - 5.0).abs() < 1e-9);

    // and nowhere else
    fn no_z_below(node: &geotrie::Node) -> bool {
        node.children()
            .iter()
            .all(|c| c.attribute(2).is_none() && no_z_below(c))
    }
    assert!(no_z_below(tree.root()));
}

#[test]
fn test_filter_greater_than() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    let tall = tree.filter_greater_than("Z", 2.0).unwrap();
    assert_eq!(tall.num_points(), 1);

    // the survivor is the (45, 45) point
    let leaves = tall.to_nodelist();
    assert_eq!(leaves.len(), 1);
    let survivor = leaves[0].coordinate().unwrap();
    assert!((survivor.x() - 45.0).abs() < 0.01);
    assert!((survivor.y() - 45.0).abs() < 0.01);

    // the input tree is untouched
    assert_eq!(tree.num_points(), 3);
}

#[test]
fn test_filter_modes() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    assert_eq!(tree.filter_less_than("Z", 1.2).unwrap().num_points(), 1);
    assert_eq!(tree.filter_between("Z", 1.0, 1.5).unwrap().num_points(), 2);
    assert_eq!(tree.filter_between("Z", 1.5, 1.0).unwrap().num_points(), 2);
    assert_eq!(tree.filter_equal("Z", 1.5).unwrap().num_points(), 1);
    assert_eq!(tree.filter_greater_than("Z", 1000.0).unwrap().num_points(), 0);
}

#[test]
fn test_filter_sees_compacted_values() {
    let schema = xyz_schema();
    let mut builder = TreeBuilder::new(schema.clone()).resolution(9);
    // two nearby points agree on Z, so it compacts above the leaves
    builder.add_point(&Point::new(10.0, 10.0), &[("Z", 7.0)]).unwrap();
    builder
        .add_point(&Point::new(10.00001, 10.00001), &[("Z", 7.0)])
        .unwrap();
    let tree = builder.build().unwrap();

    assert_eq!(tree.filter_equal("Z", 7.0).unwrap().num_points(), 2);
    assert_eq!(tree.filter_less_than("Z", 7.0).unwrap().num_points(), 0);
}

#[test]
fn test_memory_roundtrip() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    let mut writer = Writer::memory();
    tree.write(&mut writer).unwrap();
    let bytes = writer.into_bytes().unwrap();

    let mut reader = Reader::memory(bytes, schema.clone()).unwrap();
    let restored = Tree::read(&mut reader).unwrap();

    assert_eq!(restored.num_points(), 3);
    assert_eq!(restored.count_leaves(), 3);

    // leaf sets and coordinates agree exactly
    let mut before: Vec<String> = tree.to_nodelist().iter().map(|n| n.hash().to_string()).collect();
    let mut after: Vec<String> = restored
        .to_nodelist()
        .iter()
        .map(|n| n.hash().to_string())
        .collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);

    for (a, b) in tree.to_nodelist().iter().zip(restored.to_nodelist().iter()) {
        let ca = a.coordinate().unwrap();
        let cb = b.coordinate().unwrap();
        assert!((ca.x() - cb.x()).abs() < 1e-6);
        assert!((ca.y() - cb.y()).abs() < 1e-6);
    }
}

#[test]
fn test_file_roundtrip_preserves_values() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);
    let tmp = NamedTempFile::new().unwrap();

    let mut writer = Writer::file(tmp.path()).unwrap();
    tree.write(&mut writer).unwrap();
    writer.sync().unwrap();

    let mut reader = Reader::file(tmp.path(), schema.clone()).unwrap();
    let restored = Tree::read(&mut reader).unwrap();

    let z = schema.dimension_by_name("Z").unwrap();
    let mut values: Vec<f64> = restored
        .to_nodelist()
        .iter()
        .map(|n| n.attribute(2).unwrap().value(z))
        .collect();
    values.sort_by(f64::total_cmp);
    assert_eq!(values.len(), 3);
    assert!((values[0] - 1.0).abs() < 0.005);
    assert!((values[1] - 1.5).abs() < 0.005);
    assert!((values[2] - 99.9).abs() < 0.005);
}

#[test]
fn test_file_and_memory_writers_emit_identical_bytes() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);
    let tmp = NamedTempFile::new().unwrap();

    let mut file_writer = Writer::file(tmp.path()).unwrap();
    tree.write(&mut file_writer).unwrap();
    file_writer.sync().unwrap();

    let mut mem_writer = Writer::memory();
    tree.write(&mut mem_writer).unwrap();

    let from_file = std::fs::read(tmp.path()).unwrap();
    assert_eq!(from_file, mem_writer.into_bytes().unwrap().to_vec());
}

#[test]
fn test_flatten_and_rebuild() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    let rebuilt =
        Tree::from_nodelist(schema.clone(), tree.to_nodelist(), Config::default()).unwrap();
    assert_eq!(rebuilt.num_points(), tree.num_points());

    let z = schema.dimension_by_name("Z").unwrap();
    let key = |t: &Tree| {
        let mut pairs: Vec<(String, i64)> = t
            .to_nodelist()
            .iter()
            .map(|n| {
                (
                    n.hash().to_string(),
                    (n.attribute(2).unwrap().value(z) * 1000.0).round() as i64,
                )
            })
            .collect();
        pairs.sort();
        pairs
    };
    assert_eq!(key(&tree), key(&rebuilt));
}

#[test]
fn test_extent_covers_inputs() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    let extent = tree.extent().unwrap().expect("non-empty tree has an extent");
    for (x, y) in [(0.0, 0.0), (0.0001, 0.0001), (45.0, 45.0)] {
        assert!(extent.min().x <= x && x <= extent.max().x);
        assert!(extent.min().y <= y && y <= extent.max().y);
    }
}

#[test]
fn test_attribute_stats() {
    let schema = xyz_schema();
    let tree = three_point_tree(&schema);

    let stats = tree.attribute_stats("Z").unwrap();
    assert_eq!(stats.count, 3);
    assert!((stats.min - 1.0).abs() < 0.005);
    assert!((stats.max - 99.9).abs() < 0.005);
    assert!((stats.avg().unwrap() - (1.0 + 1.5 + 99.9) / 3.0).abs() < 0.01);

    assert!(tree.attribute_stats("Intensity").is_err());
}

#[test]
fn test_duplicates_policies() {
    let schema = xyz_schema();
    let point = Point::new(12.0, 34.0);

    let mut keep = TreeBuilder::new(schema.clone()).duplicates(Duplicates::Yes);
    keep.add_point(&point, &[("Z", 1.0)]).unwrap();
    keep.add_point(&point, &[("Z", 2.0)]).unwrap();
    assert_eq!(keep.build().unwrap().num_points(), 2);

    let mut merge = TreeBuilder::new(schema.clone()).duplicates(Duplicates::No);
    merge.add_point(&point, &[("Z", 1.0)]).unwrap();
    merge.add_point(&point, &[("Z", 2.0)]).unwrap();
    let tree = merge.build().unwrap();
    assert_eq!(tree.num_points(), 1);
    // the first point's value wins the merge
    let z = schema.dimension_by_name("Z").unwrap();
    let leaf = &tree.to_nodelist()[0];
    assert!((leaf.attribute(2).unwrap().value(z) - 1.0).abs() < 0.005);
}

#[test]
fn test_schema_xml_file_roundtrip() {
    let schema = xyz_schema();
    let tmp = NamedTempFile::new().unwrap();
    schema.to_xml_file(tmp.path()).unwrap();
    let restored = Schema::from_xml_file(tmp.path()).unwrap();
    assert!(schema.same(&restored));
    assert_eq!(restored.dimension_by_name("Z").unwrap().scale(), 0.01);
}

#[test]
fn test_native_encoder_agrees_with_geohash_crate() {
    let points = [
        (-74.0060, 40.7128),
        (2.3522, 48.8566),
        (151.2093, -33.8688),
        (-0.0001, 0.0001),
    ];
    for (x, y) in points {
        for resolution in [1usize, 5, 8, 12] {
            let ours = geotrie::hash::encode(&Point::new(x, y), resolution).unwrap();
            let theirs = geohash::encode(geohash::Coord { x, y }, resolution).unwrap();
            assert_eq!(ours, theirs, "({}, {}) at resolution {}", x, y, resolution);
        }
    }
}

#[test]
fn test_serialized_roundtrip_after_compaction() {
    let schema = xyz_schema();
    let mut builder = TreeBuilder::new(schema.clone()).resolution(10);
    for i in 0..50 {
        builder
            .add_point(&Point::new(5.0 + i as f64 * 1e-5, 5.0), &[("Z", 3.25)])
            .unwrap();
    }
    let tree = builder.build().unwrap();

    let mut writer = Writer::memory();
    tree.write(&mut writer).unwrap();
    let mut reader = Reader::memory(writer.into_bytes().unwrap(), schema.clone()).unwrap();
    let restored = Tree::read(&mut reader).unwrap();

    assert_eq!(restored.num_points(), 50);
    let stats = restored.attribute_stats("Z").unwrap();
    assert_eq!(stats.count, 50);
    assert!((stats.min - 3.25).abs() < 0.005);
    assert!((stats.max - 3.25).abs() < 0.005);
}
