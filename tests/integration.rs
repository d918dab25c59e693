use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "seed = 42\n"
        + "\n"
        + "[area]\n"
        + "width = 100\n"
        + "height = 100\n"
        + "\n"
        + "[hospital]\n"
        + "x = 50\n"
        + "y = 50\n"
        + "width = 10\n"
        + "height = 10\n"
        + "\n"
        + "[population]\n"
        + "n_agents = 10\n"
        + "\n"
        + "[model]\n"
        + "max_speed = 50\n"
        + "time_delta = 1\n"
        + "infect_probability = 50\n"
        + "incubation = 4320\n"
        + "stop_percent = 90\n"
        + "max_steps = 1000000\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_epiwalk"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    run_bin(&["--sim-dir", test_dir_str, "run"]);
    run_bin(&["--sim-dir", test_dir_str, "run"]);

    let diagram: Vec<u32> = fs::read_to_string(test_dir.join("run-0000/diagram.csv"))
        .expect("failed to read diagram")
        .lines()
        .map(|line| line.parse().expect("diagram line is not an integer"))
        .collect();

    assert!(!diagram.is_empty());
    assert!(diagram.windows(2).all(|w| w[0] <= w[1]));
    assert!(diagram.iter().all(|&val| (1..=10).contains(&val)));
    assert!(*diagram.last().unwrap() >= 9);

    assert!(test_dir.join("run-0001/diagram.csv").exists());

    run_bin(&["--sim-dir", test_dir_str, "analyze"]);

    assert!(test_dir.join("run-0000/results.msgpack").exists());
    assert!(test_dir.join("run-0001/results.msgpack").exists());

    run_bin(&["--sim-dir", test_dir_str, "clean"]);

    assert!(!test_dir.join("run-0000").exists());
    assert!(!test_dir.join("run-0001").exists());
    assert!(config_path.exists());

    fs::remove_dir_all(&test_dir).ok();
}
