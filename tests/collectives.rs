//! Collective operations on the world communicator, for any number of processes.
use std::os::raw::{c_int, c_void};

use mpi_handles::comm::Comm;
use mpi_handles::datatype::{DynBuffer, DynBufferMut};
use mpi_handles::ffi;
use mpi_handles::handle::UniqueHandle;
use mpi_handles::op::{Op, OpHandle};
use mpi_handles::request::scope;
use mpi_handles::traits::*;
use mpi_handles::Rank;

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();
    let universe = mpi_handles::initialize()
        .unwrap()
        .expect("MPI was already initialized");
    let world = universe.world();

    tag_ub(&world);
    barriers(&world);
    gather(&world);
    gather_dyn(&world);
    all_gather(&world);
    all_to_all(&world);
    all_to_all_dyn(&world);
    reduce(&world);
    all_reduce(&world);
    user_operator_is_freed();
}

fn tag_ub(world: &Comm) {
    assert!(world.tag_ub().unwrap() >= 32767);
    let dup = world.dup().unwrap();
    assert_eq!(dup.tag_ub().unwrap(), world.tag_ub().unwrap());
}

fn barriers(world: &Comm) {
    world.barrier().unwrap();
    scope(|scope| {
        let mut request = world.immediate_barrier(scope).unwrap();
        request.wait().unwrap();
        assert!(request.is_null());
    });
}

fn gather(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let root: Rank = size - 1;
    let send = [rank, rank * 10];

    if rank == root {
        let gathered = world.gather_vec_into_root(root, &send).unwrap();
        let expected: Vec<Rank> = (0..size).flat_map(|r| [r, r * 10]).collect();
        assert_eq!(gathered, expected);

        let mut recv = vec![0; 2 * size as usize];
        world.gather_into_root(root, &send, &mut recv).unwrap();
        assert_eq!(recv, expected);
    } else {
        world.gather_into(root, &send).unwrap();
        world.gather(root, &send, None).unwrap();
    }
}

fn gather_dyn(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap() as usize;
    let send = [rank as f64 + 0.5];

    if rank == 0 {
        let mut recv = vec![0.0f64; size];
        world
            .gather_dyn(0, DynBuffer::new(&send), Some(DynBufferMut::new(&mut recv)))
            .unwrap();
        let expected: Vec<f64> = (0..size).map(|r| r as f64 + 0.5).collect();
        assert_eq!(recv, expected);
    } else {
        world.gather_dyn(0, DynBuffer::new(&send), None).unwrap();
    }
}

fn all_gather(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();

    let ranks = world.all_gather(&[rank]).unwrap();
    assert_eq!(ranks, (0..size).collect::<Vec<_>>());

    let flags = world.all_gather(&[rank % 2 == 0]).unwrap();
    assert!(flags.iter().enumerate().all(|(r, &even)| even == (r % 2 == 0)));

    let mut recv = vec![0u16; size as usize];
    world.all_gather_into(&[rank as u16], &mut recv).unwrap();
    assert!(recv.iter().enumerate().all(|(r, &v)| v as usize == r));
}

fn all_to_all(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();

    let recv = world.all_to_all(&vec![rank; size as usize]).unwrap();
    assert_eq!(recv, (0..size).collect::<Vec<_>>());

    let send: Vec<Rank> = (0..size).map(|dest| rank * 100 + dest).collect();
    let recv = world.all_to_all(&send).unwrap();
    let expected: Vec<Rank> = (0..size).map(|source| source * 100 + rank).collect();
    assert_eq!(recv, expected);

    let send: Vec<u64> = (0..size as u64).flat_map(|dest| [dest, rank as u64]).collect();
    let mut recv = vec![0u64; send.len()];
    world.all_to_all_into(&send, &mut recv).unwrap();
    for (source, block) in recv.chunks(2).enumerate() {
        assert_eq!(block, [rank as u64, source as u64]);
    }
}

fn all_to_all_dyn(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap() as usize;

    let send: Vec<i8> = (0..size).map(|dest| (dest % 100) as i8).collect();
    let mut recv = vec![-1i8; size];
    world
        .all_to_all_dyn(DynBuffer::new(&send), DynBufferMut::new(&mut recv))
        .unwrap();
    assert!(recv.iter().all(|&v| v as usize == rank as usize % 100));

    let send: Vec<u32> = (0..size as u32).map(|dest| dest + 10 * rank as u32).collect();
    let mut recv = vec![u32::MAX; 2 * size];
    world
        .all_to_all_dyn(DynBuffer::new(&send), DynBufferMut::new(&mut recv))
        .unwrap();
    let expected: Vec<u32> = (0..size as u32).map(|source| rank as u32 + 10 * source).collect();
    assert_eq!(&recv[..size], &expected[..]);
    assert!(recv[size..].iter().all(|&v| v == u32::MAX));
}

fn reduce(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let root = 0;

    if rank == root {
        let sum = world.reduce_value_into_root(Op::sum(), root, rank).unwrap();
        assert_eq!(sum, size * (size - 1) / 2);

        let all = world
            .reduce_value_into_root(Op::logical_and(), root, true)
            .unwrap();
        assert!(all);

        let last_dissents = world
            .reduce_value_into_root(Op::logical_and(), root, rank != size - 1)
            .unwrap();
        assert!(!last_dissents);

        let extremes = world
            .reduce_vec_into_root(Op::max(), root, &[rank as f64, -(rank as f64)])
            .unwrap();
        assert_eq!(extremes, vec![(size - 1) as f64, 0.0]);

        let mut product = [0u64];
        world
            .reduce_into_root(Op::product(), root, &[2u64], &mut product)
            .unwrap();
        assert_eq!(product[0], 2u64.pow(size as u32));
    } else {
        world.reduce_into(Op::sum(), root, &[rank]).unwrap();
        world.reduce_into(Op::logical_and(), root, &[true]).unwrap();
        world
            .reduce_into(Op::logical_and(), root, &[rank != size - 1])
            .unwrap();
        world
            .reduce(Op::max(), root, &[rank as f64, -(rank as f64)], None)
            .unwrap();
        world.reduce_into(Op::product(), root, &[2u64]).unwrap();
    }
}

fn all_reduce(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();

    assert_eq!(world.all_reduce(Op::sum(), 1i64).unwrap(), size as i64);
    assert_eq!(world.all_reduce(Op::min(), rank).unwrap(), 0);
    assert!(world.all_reduce(Op::logical_or(), rank == 0).unwrap());
    assert!(!world.all_reduce(Op::logical_and(), rank == size).unwrap());

    let bits = world
        .all_reduce(Op::bitwise_or(), 1u32 << (rank % 32))
        .unwrap();
    assert_eq!(bits.count_ones(), size.min(32) as u32);

    let mut recv = [0i32; 2];
    world
        .all_reduce_into(Op::max(), &[rank, -rank], &mut recv)
        .unwrap();
    assert_eq!(recv, [size - 1, 0]);

    let sums = world.all_reduce_vec(Op::sum(), &[1u8, 0]).unwrap();
    assert_eq!(sums, vec![size as u8, 0]);
}

unsafe extern "C" fn keep_left(
    _invec: *mut c_void,
    _inoutvec: *mut c_void,
    _len: *mut c_int,
    _datatype: *mut ffi::MPI_Datatype,
) {
}

fn user_operator_is_freed() {
    let mut raw = unsafe { ffi::RSMPI_OP_NULL };
    let code = unsafe { ffi::MPI_Op_create(Some(keep_left), 1, &mut raw) };
    assert_eq!(code, ffi::MPI_SUCCESS as c_int);

    let mut op = unsafe { UniqueHandle::<OpHandle>::from_raw(raw) };
    assert!(!op.is_null());
    assert!(!op.handle().is_system_handle());
    op.reset().unwrap();
    assert!(op.is_null());
}
