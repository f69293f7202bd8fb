use ndarray::Array2;
use rpc_eval::dataset::{Annotation, CocoDataset, GroundTruth, ImageInfo};
use rpc_eval::eval::RpcEvaluator;
use rpc_eval::prediction::BoxList;
use rpc_eval::{rpc_evaluation, RpcOptions};

fn main() -> anyhow::Result<()> {
    rpc_eval::init_tracing();

    let ground_truth = GroundTruth {
        images: vec![ImageInfo {
            id: 1,
            file_name: "20180827-16-10-01-42.jpg".into(),
            width: 1815,
            height: 1815,
            level: Some("easy".into()),
        }],
        annotations: [
            [400.0, 400.0, 200.0, 300.0],
            [900.0, 500.0, 250.0, 250.0],
            [300.0, 1200.0, 180.0, 220.0],
        ]
        .into_iter()
        .enumerate()
        .map(|(i, bbox)| Annotation {
            id: Some(i as u64 + 1),
            image_id: 1,
            category_id: i as u64 % 2 + 1,
            bbox,
            area: None,
        })
        .collect(),
        categories: vec![],
    };
    let dataset = CocoDataset::from_ground_truth(ground_truth, "in-memory");

    // model output at 800x800, with a 3-object density estimate
    let scale = 800.0 / 1815.0;
    let boxes = [
        [400.0, 400.0, 600.0, 700.0],
        [900.0, 500.0, 1150.0, 750.0],
        [300.0, 1200.0, 480.0, 1420.0],
    ]
    .map(|b: [f32; 4]| b.map(|v| v * scale))
    .to_vec();
    let density = Array2::from_elem((8, 8), 3.0 / 64.0);
    let prediction = BoxList::new((800, 800), boxes, vec![1, 2, 1], vec![0.99, 0.97, 0.96])
        .with_density_map(density);

    let output = std::env::temp_dir().join("rpc_eval_demo");
    let options = RpcOptions {
        generate_pseudo_labels: true,
        ..RpcOptions::default()
    };

    println!("evaluating into {}", output.display());
    let outcome = rpc_evaluation(
        &dataset,
        &[prediction],
        &output,
        &options,
        &RpcEvaluator::default(),
    )?;
    println!("{outcome}");
    Ok(())
}
