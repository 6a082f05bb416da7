//! Communicator and group management, and attribute propagation through duplication.
use std::rc::Rc;

use mpi_handles::attribute::{create_keyval, create_keyval_without_copy, CommAttrs};
use mpi_handles::comm::{Comm, UniqueComm};
use mpi_handles::group::{Group, GroupRange};
use mpi_handles::traits::*;

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();
    let universe = mpi_handles::initialize()
        .unwrap()
        .expect("MPI was already initialized");
    let world = universe.world();

    duplicate(&world);
    create_from_strided_group(&world);
    exclude_first_rank(&world);
    empty_group();
    attributes_follow_their_keys(&world);
    attribute_values_are_dropped_with_their_communicator(&world);
    earlier_reads_survive_replacement(&world);
}

fn duplicate(world: &Comm) {
    let dup = world.dup().unwrap();
    assert!(!dup.is_null());
    assert_ne!(dup.raw(), world.raw());
    assert_eq!(dup.size().unwrap(), world.size().unwrap());
    assert_eq!(dup.rank().unwrap(), world.rank().unwrap());

    let again = dup.deref().dup().unwrap();
    assert_eq!(again.size().unwrap(), world.size().unwrap());
    again.barrier().unwrap();
}

fn create_from_strided_group(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();

    let group = world.group().unwrap();
    assert_eq!(group.size().unwrap(), size);
    assert_eq!(group.rank().unwrap(), Some(rank));

    let evens = group
        .range_incl(&[GroupRange {
            first: 0,
            last: size - 1,
            stride: 2,
        }])
        .unwrap();
    assert_eq!(evens.size().unwrap(), (size + 1) / 2);

    let sub: UniqueComm = world.create(&evens).unwrap();
    if rank % 2 == 0 {
        assert!(!sub.is_null());
        assert_eq!(sub.size().unwrap(), (size + 1) / 2);
        assert_eq!(sub.rank().unwrap(), rank / 2);
    } else {
        assert!(sub.is_null());
        assert_eq!(evens.rank().unwrap(), None);
    }
}

fn exclude_first_rank(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let group = world.group().unwrap();

    let rest = group.range_excl_unit(0, 0).unwrap();
    assert_eq!(rest.size().unwrap(), size - 1);
    assert_eq!(rest.is_empty(), size == 1);
    if rank == 0 {
        assert_eq!(rest.rank().unwrap(), None);
    } else {
        assert_eq!(rest.rank().unwrap(), Some(rank - 1));
    }

    let first = group.range_incl_unit(0, 0).unwrap();
    assert_eq!(first.size().unwrap(), 1);
}

fn empty_group() {
    let empty = Group::empty();
    assert!(empty.is_empty());
    assert_eq!(empty.size().unwrap(), 0);
    assert_eq!(empty.rank().unwrap(), None);
}

fn attributes_follow_their_keys(world: &Comm) {
    let copied = create_keyval::<String, CommAttrs>().unwrap();
    let kept = create_keyval_without_copy::<Vec<i32>, CommAttrs>().unwrap();

    let parent = world.dup().unwrap();
    assert_eq!(parent.get_attr(&copied).unwrap(), None);

    parent.set_attr(&copied, "inherited".to_string()).unwrap();
    let stored = parent.create_attr(&kept, vec![1, 2, 3]).unwrap();
    assert_eq!(stored, vec![1, 2, 3]);

    let child = parent.dup().unwrap();
    assert_eq!(child.get_attr(&copied).unwrap().as_deref(), Some("inherited"));
    assert_eq!(child.get_attr(&kept).unwrap(), None);
    assert_eq!(parent.get_attr(&kept).unwrap(), Some(vec![1, 2, 3]));

    parent.set_attr(&copied, "replaced".to_string()).unwrap();
    assert_eq!(child.get_attr(&copied).unwrap().as_deref(), Some("inherited"));
    assert_eq!(parent.get_attr(&copied).unwrap().as_deref(), Some("replaced"));

    parent.delete_attr(&kept).unwrap();
    assert_eq!(parent.get_attr(&kept).unwrap(), None);
}

fn attribute_values_are_dropped_with_their_communicator(world: &Comm) {
    let tracker = Rc::new(());
    let key = create_keyval::<Rc<()>, CommAttrs>().unwrap();

    let parent = world.dup().unwrap();
    parent.set_attr(&key, Rc::clone(&tracker)).unwrap();
    assert_eq!(Rc::strong_count(&tracker), 2);

    let child = parent.dup().unwrap();
    assert_eq!(Rc::strong_count(&tracker), 3);

    drop(child);
    assert_eq!(Rc::strong_count(&tracker), 2);

    parent.delete_attr(&key).unwrap();
    assert_eq!(Rc::strong_count(&tracker), 1);

    parent.set_attr(&key, Rc::clone(&tracker)).unwrap();
    drop(parent);
    assert_eq!(Rc::strong_count(&tracker), 1);
}

fn earlier_reads_survive_replacement(world: &Comm) {
    let key = create_keyval::<String, CommAttrs>().unwrap();
    let comm = world.dup().unwrap();
    let alias = comm.deref();

    comm.set_attr(&key, "first".to_string()).unwrap();
    let earlier = comm.get_attr(&key).unwrap();
    alias.set_attr(&key, "second".to_string()).unwrap();
    assert_eq!(earlier.as_deref(), Some("first"));

    let before_delete = alias.get_attr(&key).unwrap();
    comm.delete_attr(&key).unwrap();
    assert_eq!(before_delete.as_deref(), Some("second"));
    assert_eq!(alias.get_attr(&key).unwrap(), None);

    comm.set_attr(&key, "third".to_string()).unwrap();
    let stored = unsafe { comm.get_attr_ref(&key) }.unwrap();
    assert_eq!(stored.map(String::as_str), Some("third"));
}
