use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use kiln_graphics::{
    BufferDescriptor, BufferHandle, DeviceError, DrawStream, GpuDevice, MergedStream, ProgramDesc,
    ProgramHandle, Renderer, RendererConfig, TextureDescriptor, TextureHandle,
};

/// Device that executes nothing and keeps no history.
#[derive(Default)]
struct NullDevice {
    next: AtomicU32,
}

impl NullDevice {
    fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl GpuDevice for NullDevice {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn create_buffer(&self, _: &BufferDescriptor, _: Option<&[u8]>) -> Result<BufferHandle, DeviceError> {
        Ok(BufferHandle::from_raw(self.next()))
    }

    fn destroy_buffer(&self, _: BufferHandle) {}

    fn create_texture(&self, _: &TextureDescriptor, _: Option<&[u8]>) -> Result<TextureHandle, DeviceError> {
        Ok(TextureHandle::from_raw(self.next()))
    }

    fn destroy_texture(&self, _: TextureHandle) {}

    fn create_program(&self, _: &ProgramDesc) -> Result<ProgramHandle, DeviceError> {
        Ok(ProgramHandle::from_raw(self.next()))
    }

    fn execute(&self, stream: &MergedStream) -> Result<(), DeviceError> {
        black_box(stream.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Draw stream recording and merge
// ---------------------------------------------------------------------------

fn bench_record_flat(c: &mut Criterion) {
    c.bench_function("stream_record_finalize_4096_draws", |b| {
        b.iter(|| {
            let mut stream = DrawStream::with_capacity(4096);
            for i in 0..4096 {
                stream.draw_indexed(i, 36, 1);
            }
            black_box(stream.finalize().unwrap());
        });
    });
}

fn bench_record_substreams(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_substreams");
    for substreams in [4usize, 32, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(substreams), &substreams, |b, &n| {
            b.iter(|| {
                let mut stream = DrawStream::new();
                for i in 0..n {
                    stream.draw_arrays(i as u32, 3);
                    let sub = stream.create_substream();
                    sub.record(|s| {
                        for j in 0..16 {
                            s.draw_indexed(j, 6, 1);
                        }
                    });
                }
                black_box(stream.finalize().unwrap());
            });
        });
    }
    group.finish();
}

fn bench_buffer_updates(c: &mut Criterion) {
    let payload = [0u8; 256];
    c.bench_function("stream_update_buffer_1024x256b", |b| {
        b.iter(|| {
            let mut stream = DrawStream::new();
            for i in 0..1024 {
                stream.update_buffer(Default::default(), i * 256, &payload).unwrap();
            }
            black_box(stream.finalize().unwrap());
        });
    });
}

// ---------------------------------------------------------------------------
// Whole frames
// ---------------------------------------------------------------------------

fn bench_frame_with_jobs(c: &mut Criterion) {
    let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    let device = Arc::new(NullDevice::default());
    let config = RendererConfig::default().with_worker_threads(threads);
    let mut renderer = Renderer::new(device, config).unwrap();

    c.bench_function("renderer_frame_64_jobs", |b| {
        b.iter(|| {
            for _ in 0..64 {
                renderer.push_job(Some("bench"), |stream| {
                    for i in 0..64 {
                        stream.draw_indexed(i, 36, 1);
                    }
                });
            }
            renderer.frame();
        });
    });
}

criterion_group!(
    benches,
    bench_record_flat,
    bench_record_substreams,
    bench_buffer_updates,
    bench_frame_with_jobs,
);
criterion_main!(benches);
