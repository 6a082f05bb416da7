//! Immediate point to point operations and request completion, exchanged over `MPI_COMM_SELF`.
use std::slice;

use mpi_handles::comm::Comm;
use mpi_handles::request::{
    scope, wait_all, wait_all_statuses, wait_any, wait_some, wait_some_into, StaticScope,
};
use mpi_handles::traits::*;
use mpi_handles::{Error, Tag};

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();
    let universe = mpi_handles::initialize()
        .unwrap()
        .expect("MPI was already initialized");
    let world = universe.world();
    let comm = Comm::self_comm();

    send_to_self(&comm);
    probe_then_receive(&comm);
    test_until_complete(&comm);
    wait_for_all(&comm);
    wait_for_any(&comm);
    wait_for_some(&comm);
    static_scope();
    ring(&world);
}

fn send_to_self(comm: &Comm) {
    let send = [1i32, 2, 3];
    let mut recv = [0i32; 3];
    scope(|scope| {
        let mut receiving = comm.immediate_recv(scope, &mut recv, 0, 11).unwrap();
        let mut sending = comm.immediate_send(scope, &send, 0, 11).unwrap();
        assert_eq!(scope.num_requests(), 2);

        let status = receiving.wait_with_status().unwrap();
        assert_eq!(status.source(), 0);
        assert_eq!(status.tag(), 11);
        assert!(status.success());
        sending.wait().unwrap();
        assert_eq!(scope.num_requests(), 0);
    });
    assert_eq!(recv, send);
}

fn probe_then_receive(comm: &Comm) {
    let send = [4.5f64];
    scope(|scope| {
        let mut sending = comm.immediate_send(scope, &send, 0, 5).unwrap();
        let status = loop {
            if let Some(status) = comm.immediate_probe(0, 5).unwrap() {
                break status;
            }
        };
        assert_eq!(status.tag(), 5);
        assert_eq!(comm.immediate_probe_any(6).unwrap().map(|s| s.tag()), None);

        let mut value = 0.0f64;
        let status = comm
            .recv_with_status(slice::from_mut(&mut value), 0, 5)
            .unwrap();
        assert_eq!(value, 4.5);
        assert_eq!(status.source(), 0);
        sending.wait().unwrap();
    });
}

fn test_until_complete(comm: &Comm) {
    let mut value = 0u32;
    scope(|scope| {
        let mut receiving = comm
            .immediate_recv(scope, slice::from_mut(&mut value), 0, 21)
            .unwrap();
        assert!(!receiving.test().unwrap());
        assert_eq!(receiving.deref().status().unwrap().map(|s| s.tag()), None);

        comm.send(&[77u32], 0, 21).unwrap();
        let status = loop {
            if let Some(status) = receiving.test_with_status().unwrap() {
                break status;
            }
        };
        assert_eq!(status.tag(), 21);
        assert!(receiving.is_null());
        assert!(receiving.test().unwrap());
    });
    assert_eq!(value, 77);
}

fn wait_for_all(comm: &Comm) {
    let send: Vec<i64> = (0..4).map(|i| i * i).collect();
    let mut recv = vec![0i64; 4];
    scope(|scope| {
        let mut requests = Vec::new();
        for (tag, slot) in recv.iter_mut().enumerate() {
            requests.push(
                comm.immediate_recv(scope, slice::from_mut(slot), 0, tag as Tag)
                    .unwrap(),
            );
        }
        for (tag, value) in send.iter().enumerate() {
            requests.push(
                comm.immediate_send(scope, slice::from_ref(value), 0, tag as Tag)
                    .unwrap(),
            );
        }
        assert_eq!(scope.num_requests(), 8);

        let statuses = wait_all_statuses(&mut requests).unwrap();
        assert_eq!(statuses.len(), 8);
        for (tag, status) in statuses.iter().take(4).enumerate() {
            assert_eq!(status.tag(), tag as Tag);
        }
        assert!(requests.iter().all(|r| r.is_null()));
        assert_eq!(scope.num_requests(), 0);

        wait_all(&mut requests).unwrap();
    });
    assert_eq!(recv, send);
}

fn wait_for_any(comm: &Comm) {
    let mut recv = [0u8; 3];
    scope(|scope| {
        let mut requests: Vec<_> = recv
            .iter_mut()
            .enumerate()
            .map(|(tag, slot)| {
                comm.immediate_recv(scope, slice::from_mut(slot), 0, tag as Tag)
                    .unwrap()
            })
            .collect();

        comm.send(&[42u8], 0, 1).unwrap();
        let (index, status) = wait_any(&mut requests).unwrap().unwrap();
        assert_eq!(index, 1);
        assert_eq!(status.tag(), 1);
        assert!(requests[1].is_null());
        assert_eq!(scope.num_requests(), 2);

        comm.send(&[1u8], 0, 0).unwrap();
        comm.send(&[2u8], 0, 2).unwrap();
        let mut completed = vec![index];
        while let Some((index, _)) = wait_any(&mut requests).unwrap() {
            completed.push(index);
        }
        completed.sort_unstable();
        assert_eq!(completed, vec![0, 1, 2]);
    });
    assert_eq!(recv, [1, 42, 2]);
}

fn wait_for_some(comm: &Comm) {
    let send = [10i16, 20, 30, 40];
    let mut recv = [0i16; 4];
    scope(|scope| {
        let mut requests = Vec::new();
        for (tag, slot) in recv.iter_mut().enumerate() {
            requests.push(
                comm.immediate_recv(scope, slice::from_mut(slot), 0, tag as Tag)
                    .unwrap(),
            );
        }
        for (tag, value) in send.iter().enumerate() {
            comm.send(slice::from_ref(value), 0, tag as Tag).unwrap();
        }

        let mut indices = [0usize; 4];
        let first = wait_some(&mut requests, &mut indices, None).unwrap();
        assert!(first >= 1);
        let mut completed = indices[..first].to_vec();
        while completed.len() < 4 {
            wait_some_into(&mut requests, &mut completed).unwrap();
        }
        completed.sort_unstable();
        assert_eq!(completed, vec![0, 1, 2, 3]);

        assert!(matches!(
            wait_some_into(&mut requests, &mut completed),
            Err(Error::Logic(_))
        ));
        assert_eq!(completed.len(), 4);
    });
    assert_eq!(recv, send);
}

fn static_scope() {
    let comm = Comm::self_comm();
    let mut request = comm.immediate_barrier(StaticScope).unwrap();
    request.wait().unwrap();
    assert!(request.is_null());
}

fn ring(world: &Comm) {
    let rank = world.rank().unwrap();
    let size = world.size().unwrap();
    let next = (rank + 1) % size;
    let previous = (rank + size - 1) % size;

    let mut received = -1;
    scope(|scope| {
        let mut requests = vec![
            world
                .immediate_recv(scope, slice::from_mut(&mut received), previous, 3)
                .unwrap(),
            world.immediate_send(scope, slice::from_ref(&rank), next, 3).unwrap(),
        ];
        wait_all(&mut requests).unwrap();
    });
    assert_eq!(received, previous);
}
