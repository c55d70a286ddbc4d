use std::panic;

/// Install readable panic backtraces and make sure a panic on any thread,
/// the render worker included, also lands in the log file
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        log::error!(
            "Panic on thread {}: {panic_info}",
            thread.name().unwrap_or("<unnamed>")
        );
        log::logger().flush();

        default_hook(panic_info);
    }));
}
