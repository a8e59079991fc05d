// tests/structure_pipeline.rs
//
// End to end: CIF text through parsing, the data model and the modifier pipeline.

use cifvis::io::cif::parse_value;
use cifvis::physics::operations::{GrowState, HydrogenMode, SymmetryMode};
use cifvis::{
    combine_sym_op_label, format_value_esd, Cif, CifBlock, Config, CrystalStructure,
    HydrogenFilter, Modifier, ModifierPipeline, SymmetryGrower, SymmetryOperation, UnitCell, Value,
};
use nalgebra::{Matrix3, Vector3};

const DIMER: &str = "# hydrogen bonded dimer around an inversion centre
data_dimer
_cell_length_a 10.000(2)
_cell_length_b 10.000(2)
_cell_length_c 10.000(2)
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
_space_group_name_H-M_alt 'P -1'
_space_group_IT_number 2
loop_
_space_group_symop_id
_space_group_symop_operation_xyz
1 'x, y, z'
2 '-x, -y, -z'
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
_atom_site_U_iso_or_equiv
_atom_site_adp_type
O1 O 0.1000(2) 0.1000(2) 0.1000(2) 0.025(1) Uani
H1 H 0.1900 0.1000 0.1000 0.04 Uiso
C1 C 0.1000(3) 0.2500(3) 0.1000(3) 0.030(1) Uiso
loop_
_atom_site_aniso_label
_atom_site_aniso_U_11
_atom_site_aniso_U_22
_atom_site_aniso_U_33
_atom_site_aniso_U_12
_atom_site_aniso_U_13
_atom_site_aniso_U_23
O1 0.020(1) 0.030(1) 0.025(1) 0.001(1) 0.000(1) -0.002(1)
loop_
_geom_bond_atom_site_label_1
_geom_bond_atom_site_label_2
_geom_bond_distance
_geom_bond_site_symmetry_2
O1 H1 0.90(2) .
O1 C1 1.500(3) .
loop_
_geom_hbond_atom_site_label_D
_geom_hbond_atom_site_label_H
_geom_hbond_atom_site_label_A
_geom_hbond_distance_DH
_geom_hbond_distance_HA
_geom_hbond_distance_DA
_geom_hbond_angle_DHA
_geom_hbond_site_symmetry_A
O1 H1 O1 0.90(2) 1.90(2) 2.771(3) 163(2) 2_555
";

fn dimer() -> CrystalStructure {
    let mut cif = Cif::new(DIMER, true);
    CrystalStructure::from_cif(cif.get_block(0).unwrap()).unwrap()
}

fn labels(structure: &CrystalStructure) -> Vec<&str> {
    structure.atoms().iter().map(|a| a.label.as_str()).collect()
}

#[test]
fn document_reads_into_structure() {
    let s = dimer();
    assert_eq!(labels(&s), vec!["O1", "H1", "C1"]);
    assert!(s.atoms()[0].is_anisotropic());
    assert!(!s.atoms()[2].is_anisotropic());
    assert_eq!(s.bonds().len(), 2);
    assert_eq!(s.bonds()[0].bond_length_su, Some(0.02));
    assert_eq!(s.h_bonds()[0].acceptor_atom_symmetry, "2_555");
    assert_eq!(s.symmetry().space_group_number, 2);
    assert_eq!(s.connected_groups().len(), 1);
    assert_eq!(s.connected_groups()[0].h_bonds, vec![0]);
}

#[test]
fn default_pipeline_drops_hydrogens() {
    let s = dimer();
    let mut pipeline = ModifierPipeline::from_config(&Config::default()).unwrap();
    let out = pipeline.apply(&s).unwrap();

    assert_eq!(labels(&out), vec!["O1", "C1"]);
    assert_eq!(out.bonds().len(), 1);
    assert!(out.h_bonds().is_empty());
    // the input is left as it was
    assert_eq!(s.atoms().len(), 3);
    assert_eq!(s.h_bonds().len(), 1);
}

#[test]
fn pipeline_grows_along_hydrogen_bonds() {
    let config = Config {
        hydrogen_mode: "constant".to_string(),
        symmetry_mode: "bonds-none-hbonds-yes".to_string(),
        ..Config::default()
    };
    let mut pipeline = ModifierPipeline::from_config(&config).unwrap();
    let out = pipeline.apply(&dimer()).unwrap();

    assert_eq!(out.atoms().len(), 6);
    assert!(out.get_atom_by_label("C1@2_555").is_ok());
    assert!(out.atoms().iter().find(|a| a.label == "H1").unwrap().adp.is_none());
    assert_eq!(out.bonds().len(), 4);
    assert_eq!(out.h_bonds().len(), 1);
    assert_eq!(out.h_bonds()[0].acceptor_atom_label, "O1@2_555");
    assert_eq!(out.connected_groups().len(), 2);

    let image = out.get_atom_by_label("O1@2_555").unwrap();
    let p = image.position.to_fractional(out.cell());
    assert!((p - Vector3::new(-0.1, -0.1, -0.1)).norm() < 1e-9);
}

#[test]
fn unknown_mode_in_config_is_rejected() {
    let config = Config {
        disorder_mode: "sometimes".to_string(),
        ..Config::default()
    };
    assert!(ModifierPipeline::from_config(&config).is_err());
}

#[test]
fn su_survives_formatting() {
    for (value, su) in [(123.456, 0.007), (1.5, 0.02), (0.0312, 0.0004), (1234.0, 30.0)] {
        let text = format_value_esd(value, su, 4);
        let parsed = parse_value(&text, true);
        let read = parsed.value.as_f64().unwrap();
        assert!((read - value).abs() <= su, "{text}");
        assert!((parsed.su.unwrap() - su).abs() < 1e-9, "{text}");
    }
}

#[test]
fn value_with_uncertainty() {
    let parsed = parse_value("123.456(7)", true);
    assert_eq!(parsed.value, Value::Float(123.456));
    assert!((parsed.su.unwrap() - 0.007).abs() < 1e-12);
}

#[test]
fn loop_columns_match_row_count() {
    let mut cif = Cif::new(DIMER, true);
    let block = cif.get_block(0).unwrap();
    for key in ["_atom_site", "_atom_site_aniso", "_geom_bond", "_geom_hbond"] {
        let lp = block.get_loop(&[key]).unwrap();
        let rows = lp.row_count().unwrap();
        for header in lp.headers().unwrap() {
            assert_eq!(lp.get(&[header.as_str()]).unwrap().len(), rows, "{header}");
        }
    }
}

#[test]
fn two_atom_site_loops_keep_their_columns() {
    let text = "data_x
loop_
_atom_site_label
_atom_site_type_symbol
C1 C
O1 O
loop_
_atom_site_oxford_label
_atom_site_oxford_type
X1 a
";
    let block = CifBlock::parse(text, true).unwrap();
    let mut keys: Vec<&str> = block.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["_atom_site", "_atom_site_oxford"]);
    let main = block.get_loop(&["_atom_site"]).unwrap();
    assert_eq!(
        main.get(&["_atom_site_type_symbol"]).unwrap(),
        &[Value::from("C"), Value::from("O")]
    );
}

#[test]
fn symmetry_strings_round_trip() {
    for text in ["x,y,z", "-x,y+1/2,-z+1/2", "y,x-y,z+2/3", "-x+1/4,-y+3/4,z"] {
        let op = SymmetryOperation::new(text).unwrap();
        let again = SymmetryOperation::new(&op.to_symmetry_string(None)).unwrap();
        assert_eq!(op, again, "{text}");
    }
    let identity = SymmetryOperation::new("x,y,z").unwrap();
    let point = Vector3::new(0.12, -0.4, 0.77);
    assert_eq!(identity.apply_to_point(&point), point);
}

#[test]
fn cubic_cell_matrix() {
    let cell = UnitCell::new(10.0, 10.0, 10.0, 90.0, 90.0, 90.0).unwrap();
    assert!((cell.fract_to_cart_matrix() - Matrix3::identity() * 10.0).norm() < 1e-9);
}

#[test]
fn hydrogen_filter_and_labels() {
    let s = dimer();
    let out = HydrogenFilter::new(HydrogenMode::None).apply(&s).unwrap();
    assert!(out.atoms().iter().all(|a| !a.is_hydrogen()));
    assert!(out.bonds().iter().all(|b| !b.involves("H1")));

    assert_eq!(combine_sym_op_label("C1", "2_555"), "C1@2_555");
    assert_eq!(combine_sym_op_label("C1", "."), "C1");
}

#[test]
fn grower_falls_back_without_symmetry_bonds() {
    let s = dimer();
    let mut grower = SymmetryGrower::new(SymmetryMode::new(GrowState::Yes, GrowState::Yes));
    let out = grower.apply(&s).unwrap();
    // no bond carries a symmetry code
    assert_eq!(grower.mode(), SymmetryMode::new(GrowState::None, GrowState::No));
    assert_eq!(out.atoms().len(), 3);

    grower.cycle_mode(&s);
    assert_eq!(grower.mode(), SymmetryMode::new(GrowState::None, GrowState::Yes));
    assert_eq!(grower.apply(&s).unwrap().atoms().len(), 6);
}

#[test]
fn groups_partition_atoms() {
    let s = dimer();
    let mut seen: Vec<usize> = s
        .connected_groups()
        .iter()
        .flat_map(|g| g.atoms.iter().copied())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..s.atoms().len()).collect::<Vec<_>>());
}
