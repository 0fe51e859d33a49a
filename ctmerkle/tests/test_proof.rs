use ctmerkle::{
    config::Config,
    merkletree::{ConsistencyProof, InclusionProof, LeafStore, SparseMerkleTree, SparseProof},
    utils::hasher::{hash_children, hash_leaf, Hash32, Hasher, HasherKind},
    verify_consistency_proof_with, verify_inclusion_proof_with, MerkleError, MerkleTree,
};
use rand_core::{OsRng, RngCore};

fn sha256() -> &'static dyn Hasher {
    HasherKind::Sha256.hasher()
}

fn build_tree(n: usize) -> MerkleTree {
    let mut store = LeafStore::with_hasher(n, sha256()).unwrap();
    for i in 0..n {
        store.add_leaf(format!("leaf_data_{}", i)).unwrap();
    }
    store.build(&Config::single_threaded()).unwrap()
}

/// MTH(D[n]) computed straight from the recursive definition.
fn reference_root(h: &dyn Hasher, leaves: &[Hash32]) -> Hash32 {
    if leaves.len() == 1 {
        return leaves[0];
    }
    let k = leaves.len().next_power_of_two() / 2;
    hash_children(
        h,
        &reference_root(h, &leaves[..k]),
        &reference_root(h, &leaves[k..]),
    )
}

/// SUBPROOF(m, D[n], b) computed straight from the recursive definition.
fn reference_subproof(h: &dyn Hasher, m: usize, leaves: &[Hash32], b: bool) -> Vec<Hash32> {
    let n = leaves.len();
    if m == n {
        return if b {
            vec![]
        } else {
            vec![reference_root(h, leaves)]
        };
    }
    let k = n.next_power_of_two() / 2;
    if m <= k {
        let mut p = reference_subproof(h, m, &leaves[..k], b);
        p.push(reference_root(h, &leaves[k..]));
        p
    } else {
        let mut p = reference_subproof(h, m - k, &leaves[k..], false);
        p.push(reference_root(h, &leaves[..k]));
        p
    }
}

fn random_below(n: usize) -> usize {
    (OsRng.next_u64() % n as u64) as usize
}

#[test]
fn test_round_trip_all_sizes() {
    for n in 1..=70 {
        let tree = build_tree(n);
        assert_eq!(tree.root_hash(), reference_root(sha256(), tree.leaf_hashes()));
        for i in 0..n {
            let proof = tree.generate_inclusion_proof(i).unwrap();
            let leaf = tree.leaf_hashes()[i];
            assert!(verify_inclusion_proof_with(sha256(), &proof, &leaf, &tree.root_hash()));
        }
    }
}

#[test]
fn test_tamper_detection() {
    let tree = build_tree(1000);
    let root = tree.root_hash();
    for _ in 0..64 {
        let index = random_below(1000);
        let proof = tree.generate_inclusion_proof(index).unwrap();
        let leaf = tree.leaf_hashes()[index];

        let mut tampered = proof.clone();
        let entry = random_below(tampered.path.len());
        let bit = random_below(256);
        tampered.path[entry][bit / 8] ^= 1 << (bit % 8);
        assert!(!tampered.verify(sha256(), &leaf, &root));

        let other = tree.leaf_hashes()[(index + 1 + random_below(999)) % 1000];
        assert!(!proof.verify(sha256(), &other, &root));

        let mut stale_root = root;
        stale_root[random_below(32)] ^= 0x01;
        assert!(!proof.verify(sha256(), &leaf, &stale_root));
    }
}

#[test]
fn test_proof_against_newer_root_fails() {
    let old = build_tree(10);
    let new = build_tree(11);
    let proof = old.generate_inclusion_proof(3).unwrap();
    let leaf = old.leaf_hashes()[3];
    assert!(proof.verify(sha256(), &leaf, &old.root_hash()));
    assert!(!proof.verify(sha256(), &leaf, &new.root_hash()));
}

#[test]
fn test_inclusion_proof_serde() {
    let tree = build_tree(37);
    let proof = tree.generate_inclusion_proof(20).unwrap();
    let bz = bincode::serialize(&proof).unwrap();
    let decoded: InclusionProof = bincode::deserialize(&bz).unwrap();
    assert_eq!(decoded, proof);

    let wire = InclusionProof::from_bytes(&proof.to_bytes().unwrap()).unwrap();
    assert!(wire.verify(sha256(), &tree.leaf_hashes()[20], &tree.root_hash()));
}

#[test]
fn test_decode_errors() {
    let tree = build_tree(6);
    let bz = tree.generate_inclusion_proof(1).unwrap().to_bytes().unwrap();
    let err = InclusionProof::from_bytes(&bz[..10]).unwrap_err();
    assert!(matches!(err, MerkleError::Decode(_)));
    assert!(err.to_string().starts_with("Malformed proof"));
}

#[test]
fn test_deserialized_proof_encodes_or_fails() {
    let tree = build_tree(6);
    let mut proof = tree.generate_inclusion_proof(2).unwrap();
    proof.directions.clear();
    // serde accepts whatever it is given; the wire encoder must not
    let bz = bincode::serialize(&proof).unwrap();
    let decoded: InclusionProof = bincode::deserialize(&bz).unwrap();
    let err = decoded.to_bytes().unwrap_err();
    assert!(matches!(err, MerkleError::Decode(_)));

    let mut consistency = tree.generate_consistency_proof(3).unwrap();
    consistency.path = vec![[0u8; 32]; 100];
    assert!(consistency.to_bytes().is_err());
}

#[test]
fn test_consistency_matches_reference() {
    let h = sha256();
    let tree = build_tree(40);
    let leaves = tree.leaf_hashes();
    for m in 1..40 {
        let proof = tree.generate_consistency_proof(m).unwrap();
        assert_eq!(proof.path, reference_subproof(h, m, leaves, true), "m = {}", m);
        let old_root = reference_root(h, &leaves[..m]);
        assert_eq!(tree.root_at(m).unwrap(), old_root);
        assert!(verify_consistency_proof_with(h, &proof, &old_root, &tree.root_hash()));
    }
}

#[test]
fn test_consistency_between_builds() {
    let h = sha256();
    let old = build_tree(21);
    let new = build_tree(64);
    let proof = new.generate_consistency_proof(21).unwrap();
    assert!(proof.verify(h, &old.root_hash(), &new.root_hash()));

    // a forked log with the same size does not verify
    let mut store = LeafStore::with_hasher(64, h).unwrap();
    for i in 0..64 {
        let record = if i == 7 {
            "forked".to_string()
        } else {
            format!("leaf_data_{}", i)
        };
        store.add_leaf(record).unwrap();
    }
    let forked = store.build(&Config::single_threaded()).unwrap();
    assert!(!proof.verify(h, &old.root_hash(), &forked.root_hash()));

    let bz = bincode::serialize(&proof).unwrap();
    let decoded: ConsistencyProof = bincode::deserialize(&bz).unwrap();
    assert_eq!(ConsistencyProof::from_bytes(&decoded.to_bytes().unwrap()).unwrap(), proof);
}

#[test]
fn test_log_non_inclusion() {
    let h = sha256();
    let tree = build_tree(50);
    let index = tree.sparse_index();
    assert_eq!(index.len(), 50);
    let root = index.root();

    let proof = tree.prove_absent("leaf_data_50").unwrap();
    assert_eq!(proof.key, hash_leaf(h, "leaf_data_50"));
    assert!(proof.verify_non_inclusion(h, &root));

    let present = hash_leaf(h, "leaf_data_7");
    assert!(matches!(
        tree.prove_absent("leaf_data_7"),
        Err(MerkleError::KeyPresent)
    ));
    let inclusion = index.prove(&present);
    assert!(inclusion.verify_inclusion(h, &present, &root));
    assert!(!inclusion.verify_non_inclusion(h, &root));
}

#[test]
fn test_sparse_random_keys() {
    let h = sha256();
    let mut smt = SparseMerkleTree::new(h);
    let mut keys = Vec::new();
    for _ in 0..32 {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        smt.insert(key, hash_leaf(h, key));
        keys.push(key);
    }
    let root = smt.root();
    for key in &keys {
        let p = smt.prove(key);
        assert!(p.verify_inclusion(h, &hash_leaf(h, key), &root));
    }

    let mut absent = [0u8; 32];
    OsRng.fill_bytes(&mut absent);
    let p = smt.generate_non_inclusion_proof(&absent).unwrap();
    assert!(p.verify_non_inclusion(h, &root));

    let bz = bincode::serialize(&p).unwrap();
    let decoded: SparseProof = bincode::deserialize(&bz).unwrap();
    assert!(decoded.verify_non_inclusion(h, &root));
    assert!(!decoded.verify_non_inclusion(HasherKind::Blake2s.hasher(), &root));
}

#[test]
fn test_many_absence_proofs_share_one_index() {
    let h = sha256();
    let tree = build_tree(5_000);
    let root = tree.sparse_index().root();
    for i in 5_000..5_500 {
        let proof = tree.prove_absent(format!("leaf_data_{}", i)).unwrap();
        assert!(proof.verify_non_inclusion(h, &root));
    }
    for i in (0..5_000).step_by(500) {
        let key = tree.leaf_hashes()[i];
        let proof = tree.sparse_index().prove(&key);
        assert!(proof.verify_inclusion(h, &key, &root));
    }
}
