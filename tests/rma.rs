//! One-sided communication through an allocated window, each rank talking to its neighbours.
use mpi_handles::attribute::{create_keyval, WinAttrs};
use mpi_handles::comm::Comm;
use mpi_handles::info::UniqueInfo;
use mpi_handles::traits::*;
use mpi_handles::window::{LockAssert, LockType, UniqueWin};
use mpi_handles::Error;

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();
    let universe = mpi_handles::initialize()
        .unwrap()
        .expect("MPI was already initialized");
    let world = universe.world();

    allocation(&world);
    get_and_put(&world);
    passive_target_on_all(&world);
    window_attributes(&world);
    access_outside_an_epoch_is_an_error(&world);
}

fn allocation(world: &Comm) {
    let win = UniqueWin::<i64>::allocate(world, 4).unwrap();
    assert_eq!(win.len(), 4);
    assert!(win.iter().all(|&value| value == 0));
    assert_eq!(win.size().unwrap(), 4);
    assert_eq!(win.base().unwrap() as *const i64, win.local().as_ptr());
    win.free().unwrap();

    let mut info = UniqueInfo::create().unwrap();
    info.set("no_locks", "false").unwrap();
    let empty = UniqueWin::<f32>::allocate_with_info(world, 0, &info).unwrap();
    assert!(empty.is_empty());
    assert!(empty.local().is_empty());
}

fn get_and_put(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let next = (rank + 1) % size;
    let previous = (rank + size - 1) % size;

    let mut win = UniqueWin::<i64>::allocate(world, 3).unwrap();
    win.lock(LockType::Exclusive, rank, LockAssert::None).unwrap();
    win[0] = rank as i64 * 10;
    win.unlock(rank).unwrap();
    world.barrier().unwrap();

    let mut fetched = [0i64];
    win.lock(LockType::Shared, next, LockAssert::None).unwrap();
    win.get(&mut fetched, next, 0).unwrap();
    win.unlock(next).unwrap();
    assert_eq!(fetched[0], next as i64 * 10);
    world.barrier().unwrap();

    win.lock(LockType::Exclusive, next, LockAssert::None).unwrap();
    win.put(&[rank as i64 + 1, -1], next, 1).unwrap();
    win.unlock(next).unwrap();
    world.barrier().unwrap();

    win.lock(LockType::Shared, rank, LockAssert::None).unwrap();
    let local = win.local().to_vec();
    win.unlock(rank).unwrap();
    assert_eq!(local, vec![rank as i64 * 10, previous as i64 + 1, -1]);
    world.barrier().unwrap();
}

fn passive_target_on_all(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let next = (rank + 1) % size;

    let win = UniqueWin::<u32>::allocate(world, 1).unwrap();
    win.lock_all(LockAssert::NoCheck).unwrap();
    win.put(&[7 + rank as u32], next, 0).unwrap();
    win.flush_all().unwrap();
    win.unlock_all().unwrap();
    world.barrier().unwrap();

    let previous = (rank + size - 1) % size;
    win.lock(LockType::Shared, rank, LockAssert::None).unwrap();
    assert_eq!(win[0], 7 + previous as u32);
    win.unlock(rank).unwrap();
    world.barrier().unwrap();
}

fn window_attributes(world: &Comm) {
    let key = create_keyval::<String, WinAttrs>().unwrap();
    let win = UniqueWin::<u8>::allocate(world, 8).unwrap();
    assert_eq!(win.get_attr(&key).unwrap(), None);

    let stored = win.create_attr(&key, "halo".to_string()).unwrap();
    assert_eq!(stored, "halo");
    win.delete_attr(&key).unwrap();
    assert_eq!(win.get_attr(&key).unwrap(), None);

    win.set_attr(&key, "freed with the window".to_string()).unwrap();
}

fn access_outside_an_epoch_is_an_error(world: &Comm) {
    let rank = world.rank().unwrap();
    let win = UniqueWin::<i32>::allocate(world, 1).unwrap();

    let mut fetched = [0i32];
    match win.get(&mut fetched, rank, 0) {
        Err(Error::Mpi(_)) => {}
        other => panic!("get without a lock returned {:?}", other),
    }
    match win.unlock(rank) {
        Err(Error::Mpi(_)) => {}
        other => panic!("unlock without a lock returned {:?}", other),
    }

    world.barrier().unwrap();
    win.free().unwrap();
}
