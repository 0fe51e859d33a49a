//! Runs in its own process: the tests here fix the process-wide hasher.

use ctmerkle::{
    config::Config,
    merkletree::LeafStore,
    utils::hasher::{self, HasherKind},
    verify_consistency_proof, verify_inclusion_proof, MerkleError,
};
use serial_test::serial;

fn install_blake2s() {
    let _ = env_logger::builder().is_test(true).try_init();
    hasher::install(HasherKind::Blake2s).unwrap();
}

#[test]
#[serial]
fn test_install_is_sticky() {
    install_blake2s();
    assert_eq!(hasher::active_kind(), HasherKind::Blake2s);
    // installing the same kind again is fine
    assert_eq!(
        hasher::install(HasherKind::Blake2s).unwrap().kind(),
        HasherKind::Blake2s
    );

    let err = hasher::install(HasherKind::Sha256).unwrap_err();
    assert!(matches!(
        err,
        MerkleError::HasherAlreadyInstalled {
            active: "blake2s",
            requested: "sha256"
        }
    ));
    assert_eq!(hasher::active_kind(), HasherKind::Blake2s);
}

#[test]
#[serial]
fn test_defaults_follow_installed_hasher() {
    install_blake2s();
    let config = Config::new(5, 2, 1);
    let mut store = LeafStore::with_config(&config).unwrap();
    assert_eq!(store.hasher().kind(), HasherKind::Blake2s);
    for i in 0..5 {
        store.add_leaf(format!("leaf{}", i)).unwrap();
    }
    let tree = store.build(&config).unwrap();
    assert_eq!(tree.hasher().kind(), HasherKind::Blake2s);
    assert_eq!(
        hex::encode(tree.root_hash()),
        "28015afa7156891ef9806addaf722c128c824d4bb9640864c74f849c585e02a5"
    );

    for i in 0..5 {
        let proof = tree.generate_inclusion_proof(i).unwrap();
        let leaf = tree.leaf_hash(i).unwrap();
        assert!(verify_inclusion_proof(&proof, &leaf, &tree.root_hash()));
    }

    let consistency = tree.generate_consistency_proof(3).unwrap();
    let old_root = tree.root_at(3).unwrap();
    assert!(verify_consistency_proof(
        &consistency,
        &old_root,
        &tree.root_hash()
    ));
}
